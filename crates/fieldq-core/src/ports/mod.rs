//! Ports - 外部依存の抽象化（trait 定義）
//!
//! エンジンは協調者を一切所有しません。永続化、バックエンド API、接続状態、
//! ライフサイクル、バックグラウンド実行、位置情報はすべて trait object として
//! 注入され、テストでは in-memory の fake に差し替えられます。

pub mod background;
pub mod clock;
pub mod domain_api;
pub mod event_sink;
pub mod id_generator;
pub mod lifecycle;
pub mod location;
pub mod queue_store;
pub mod reachability;

pub use self::background::{BackgroundExecutor, BackgroundTaskId};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::domain_api::DomainApi;
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::lifecycle::{LifecycleEvent, LifecycleSignal};
pub use self::location::LocationProvider;
pub use self::queue_store::{ProcessingFlag, QueueCounts, QueueStore};
pub use self::reachability::ReachabilitySource;
