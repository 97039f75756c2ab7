//! キューイベントの状態遷移

use serde::{Deserialize, Serialize};
use std::fmt;

/// EventStatus はキューイベントのライフサイクル状態
///
/// # 状態遷移
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Pending（回復可能な失敗。retry_count + 1）
/// - Pending -> Processing -> Failed（リトライ上限到達 or 恒久的な拒否）
/// - Pending -> Failed（リトライ予算を使い切った状態で順番が来た。配送しない）
/// - Failed -> Pending（手動リトライのみ）
///
/// `Processing` は永続化されません。processing flag がそのイベントを
/// 指している間だけ存在します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EventStatus {
    /// 終端状態からは自動遷移しない
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processing => "processing",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EventStatus::Pending),
            "processing" => Some(EventStatus::Processing),
            "completed" => Some(EventStatus::Completed),
            "failed" => Some(EventStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// store に依頼する atomic な状態変更 1 つ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransition {
    /// Pending -> Processing.
    Processing,
    /// Processing -> Completed. Clears `last_error`.
    Completed,
    /// Processing -> Pending after a recoverable failure. Increments `retry_count`.
    Requeued { error: String },
    /// Processing -> Failed. Increments `retry_count`.
    Failed { error: String },
    /// Pending -> Failed（配送せずに終端化）。`retry_count` は変えない
    Exhausted { error: String },
    /// Failed -> Pending on operator request. Resets `retry_count`.
    ManualRetry,
}

impl StatusTransition {
    /// この遷移を適用できる遷移元の状態
    pub fn from_status(&self) -> EventStatus {
        match self {
            StatusTransition::Processing | StatusTransition::Exhausted { .. } => {
                EventStatus::Pending
            }
            StatusTransition::Completed
            | StatusTransition::Requeued { .. }
            | StatusTransition::Failed { .. } => EventStatus::Processing,
            StatusTransition::ManualRetry => EventStatus::Failed,
        }
    }

    pub fn to_status(&self) -> EventStatus {
        match self {
            StatusTransition::Processing => EventStatus::Processing,
            StatusTransition::Completed => EventStatus::Completed,
            StatusTransition::Requeued { .. } | StatusTransition::ManualRetry => {
                EventStatus::Pending
            }
            StatusTransition::Failed { .. } | StatusTransition::Exhausted { .. } => {
                EventStatus::Failed
            }
        }
    }

    /// 配送の失敗 1 回として数える遷移か
    pub fn is_failed_attempt(&self) -> bool {
        matches!(
            self,
            StatusTransition::Requeued { .. } | StatusTransition::Failed { .. }
        )
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StatusTransition::Requeued { error }
            | StatusTransition::Failed { error }
            | StatusTransition::Exhausted { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::completed(EventStatus::Completed, true)]
    #[case::failed(EventStatus::Failed, true)]
    #[case::pending(EventStatus::Pending, false)]
    #[case::processing(EventStatus::Processing, false)]
    fn terminal_statuses(#[case] status: EventStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[rstest]
    #[case::processing(StatusTransition::Processing, EventStatus::Pending, EventStatus::Processing)]
    #[case::completed(StatusTransition::Completed, EventStatus::Processing, EventStatus::Completed)]
    #[case::requeued(
        StatusTransition::Requeued { error: "timeout".into() },
        EventStatus::Processing,
        EventStatus::Pending
    )]
    #[case::failed(
        StatusTransition::Failed { error: "timeout".into() },
        EventStatus::Processing,
        EventStatus::Failed
    )]
    #[case::exhausted(
        StatusTransition::Exhausted { error: "budget spent".into() },
        EventStatus::Pending,
        EventStatus::Failed
    )]
    #[case::manual_retry(StatusTransition::ManualRetry, EventStatus::Failed, EventStatus::Pending)]
    fn transition_endpoints(
        #[case] transition: StatusTransition,
        #[case] from: EventStatus,
        #[case] to: EventStatus,
    ) {
        assert_eq!(transition.from_status(), from);
        assert_eq!(transition.to_status(), to);
    }

    #[test]
    fn only_failures_count_as_attempts() {
        assert!(StatusTransition::Requeued { error: "x".into() }.is_failed_attempt());
        assert!(StatusTransition::Failed { error: "x".into() }.is_failed_attempt());
        assert!(!StatusTransition::Completed.is_failed_attempt());
        assert!(!StatusTransition::ManualRetry.is_failed_attempt());
        assert!(!StatusTransition::Exhausted { error: "x".into() }.is_failed_attempt());
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&EventStatus::Processing).unwrap();
        assert_eq!(s, "\"processing\"");
        assert_eq!(EventStatus::parse("failed"), Some(EventStatus::Failed));
    }
}
