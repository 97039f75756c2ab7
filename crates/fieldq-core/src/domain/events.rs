//! Events - キューイング / 送出中にエンジンが出す通知
//!
//! 中身は ID とカウンタのみ。payload の内容は載せません。

use serde::{Deserialize, Serialize};

use super::ids::{EventId, PassId};
use super::payload::EventType;

/// パスを開始したきっかけ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// エンジン起動。前回の実行が残したものを流す
    Startup,
    /// 接続が unreachable -> reachable になった
    ConnectivityRestored,
    /// アプリが前面に来た
    BecameActive,
    /// アプリがバックグラウンドに移った
    EnteredBackground,
    /// OS のバックグラウンド機構からの定期起床
    PeriodicWake,
    /// Event Manager がキューに積んだ直後
    Enqueued,
    /// 明示的な呼び出し（オペレータの「今すぐ再送」、テスト）
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueNotification {
    EventQueued {
        id: EventId,
        event_type: EventType,
    },
    PassStarted {
        pass_id: PassId,
        trigger: Trigger,
        pending: usize,
    },
    EventCompleted {
        id: EventId,
        event_type: EventType,
    },
    EventRequeued {
        id: EventId,
        retry_count: u32,
        error: String,
    },
    /// 終端失敗。オペレータが確認すべき通知
    EventFailed {
        id: EventId,
        event_type: EventType,
        retry_count: u32,
        error: String,
    },
    PassFinished {
        pass_id: PassId,
        completed: usize,
        requeued: usize,
        failed: usize,
    },
}

impl QueueNotification {
    pub fn needs_attention(&self) -> bool {
        matches!(self, QueueNotification::EventFailed { .. })
    }
}
