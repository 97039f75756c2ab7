//! BackgroundExecutor port - OS の遅延実行機構
//!
//! # 2 つの機能
//! - バックグラウンド移行後の短い追加実行時間（`begin_task` / `end_task`）
//! - アプリが前面になくてもキューを流すための定期起床
//!   （`register_periodic` / `unregister_periodic`）。
//!   起床は `LifecycleEvent::PeriodicWake` として届く

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::BackgroundError;

/// バックグラウンド実行枠 1 つ分のハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    async fn begin_task(&self, label: &str) -> Result<BackgroundTaskId, BackgroundError>;

    async fn end_task(&self, id: BackgroundTaskId);

    async fn register_periodic(&self, interval: Duration) -> Result<(), BackgroundError>;

    async fn unregister_periodic(&self);
}
