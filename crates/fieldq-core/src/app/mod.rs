//! App - ports を組み立てたエンジン本体
//!
//! # コンポーネント
//! - **EventManager**: 直接送信 + キューへのフォールバック
//! - **QueueProcessor**: pending キューに対する single-flight なパス
//! - **triggers**: 接続 / ライフサイクルのリスナーと `Subscription` ハンドル
//! - **EngineBuilder / Engine**: ワイヤリング、起動、停止
//! - **QueueConfig**, **QueueStatus**

pub mod builder;
pub mod config;
pub mod event_manager;
pub mod processor;
pub mod status;
pub mod triggers;

pub use self::builder::{BuildError, Engine, EngineBuilder};
pub use self::config::QueueConfig;
pub use self::event_manager::{
    EventManager, PersonnelStaffingInput, PersonnelStatusInput, SubmitOutcome, UnitStatusInput,
};
pub use self::processor::{PassOutcome, PassReport, QueueProcessor, SkipReason};
pub use self::status::{FailedEventView, QueueStatus};
pub use self::triggers::{Subscription, TriggerSubscriptions};
