//! fieldq-core
//!
//! 現場業務クライアント向けのオフラインイベントキュー + 同期エンジン。
//!
//! 状態を変える操作（隊員ステータス、ユニットステータス、配置）はまずサーバへ
//! 直接送ります。失敗した場合は永続キューに書き込み、接続回復やアプリの
//! ライフサイクルをきっかけに、作成順のまま後で再送します。
//!
//! # モジュール構成
//! - **domain**: ID、payload、キューイベントと状態遷移、リトライ判定、エラー、
//!   通知、PII の扱い
//! - **ports**: 外部との境界の trait（store、domain API、到達性、
//!   ライフサイクル、バックグラウンド実行、位置、時計）
//! - **impls**: sqlite / in-memory store、dispatcher、ホスト駆動のシグナル
//!   アダプタ、event sink
//! - **app**: `EventManager`、`QueueProcessor`、トリガー配線、`Engine`

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, Engine, EngineBuilder, EventManager, PassOutcome, PassReport, QueueConfig,
    QueueProcessor, QueueStatus, SkipReason, SubmitOutcome,
};
pub use domain::{
    DeliveryError, EnqueueError, EventId, EventPayload, EventStatus, EventType, ProcessError,
    QueuedEvent, StoreError,
};
