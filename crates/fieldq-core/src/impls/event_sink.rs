//! EventSink implementations.
//!
//! - `TracingEventSink`: notifications become log lines; terminal failures
//!   are logged at `warn`.
//! - `BroadcastEventSink`: fan-out to in-process subscribers (UI badges,
//!   tests).

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::QueueNotification;
use crate::ports::EventSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, notification: QueueNotification) {
        match &notification {
            QueueNotification::EventFailed {
                id,
                event_type,
                retry_count,
                error,
            } => warn!(
                event_id = %id,
                %event_type,
                retry_count,
                error = %error,
                "queued event failed permanently"
            ),
            QueueNotification::PassFinished {
                pass_id,
                completed,
                requeued,
                failed,
            } => info!(%pass_id, completed, requeued, failed, "queue pass finished"),
            other => debug!(notification = ?other, "queue notification"),
        }
    }
}

pub struct BroadcastEventSink {
    tx: broadcast::Sender<QueueNotification>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueNotification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, notification: QueueNotification) {
        // no subscribers is fine
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventId, EventType};
    use ulid::Ulid;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let sink = BroadcastEventSink::default();
        let mut rx = sink.subscribe();

        let id = EventId::from_ulid(Ulid::new());
        sink.emit(QueueNotification::EventQueued {
            id,
            event_type: EventType::UnitStatus,
        });

        let got = rx.recv().await.unwrap();
        assert_eq!(
            got,
            QueueNotification::EventQueued {
                id,
                event_type: EventType::UnitStatus
            }
        );
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        BroadcastEventSink::new(4).emit(QueueNotification::PassFinished {
            pass_id: crate::domain::PassId::from_ulid(Ulid::new()),
            completed: 0,
            requeued: 0,
            failed: 0,
        });
    }
}
