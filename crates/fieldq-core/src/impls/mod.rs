//! Impls - ports の具体実装
//!
//! # 含まれるもの
//! - **SqliteQueueStore**: 永続ストア（sqlx/sqlite）
//! - **InMemoryQueueStore**: 揮発ストア兼テスト用 fake
//! - **Dispatcher**: payload の variant → `DomainApi` の操作
//! - **ScriptedDomainApi**: 失敗を仕込めるプロセス内 API
//! - ホスト駆動のシグナル: `ManualReachability`, `ManualLifecycle`,
//!   `RecordingBackgroundExecutor`, `StaticLocationProvider`
//! - sink: `TracingEventSink`, `BroadcastEventSink`

pub mod background;
pub mod dispatch;
pub mod event_sink;
pub mod inmem_store;
pub mod lifecycle;
pub mod location;
pub(crate) mod processing;
pub mod reachability;
pub mod scripted_api;
pub mod sqlite_store;

pub use self::background::{BackgroundCall, RecordingBackgroundExecutor};
pub use self::dispatch::Dispatcher;
pub use self::event_sink::{BroadcastEventSink, TracingEventSink};
pub use self::inmem_store::InMemoryQueueStore;
pub use self::lifecycle::ManualLifecycle;
pub use self::location::StaticLocationProvider;
pub use self::reachability::ManualReachability;
pub use self::scripted_api::ScriptedDomainApi;
pub use self::sqlite_store::SqliteQueueStore;
