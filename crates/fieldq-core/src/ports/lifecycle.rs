//! LifecycleSignal port - アプリのライフサイクル通知

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    BecameActive,
    EnteredBackground,
    /// OS のバックグラウンド機構が定期的に配送する
    PeriodicWake,
    Terminating,
}

pub trait LifecycleSignal: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent>;
}
