//! Status - キューの中身と要対応事項

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::pii::{PiiAudit, audit_pii_exposure};
use crate::domain::{EventId, EventType, QueuedEvent, StoreError};
use crate::ports::QueueStore;

/// 終端失敗 1 件（payload は含まない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEventView {
    pub id: EventId,
    pub event_type: EventType,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&QueuedEvent> for FailedEventView {
    fn from(event: &QueuedEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            retry_count: event.retry_count,
            last_error: event.last_error.clone(),
            created_at: event.created_at,
        }
    }
}

/// 診断画面やログ向けのスナップショット。
/// payload の内容を持たないので、そのまま serialize してよい。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: bool,
    pub in_flight: Option<EventId>,
    pub failed: Vec<FailedEventView>,
    /// How much of what is retained on the device identifies people or places.
    pub pii: PiiAudit,
}

impl QueueStatus {
    pub async fn collect(store: &dyn QueueStore) -> Result<Self, StoreError> {
        let pending = store.get_pending_events().await?;
        let failed = store.get_failed_events().await?;
        let flag = store.processing_flag().await?;

        let mut retained = pending.clone();
        retained.extend(failed.iter().cloned());
        if let Some(id) = flag.event_id
            && let Some(event) = store.get_event(id).await?
        {
            retained.push(event);
        }

        Ok(Self {
            pending: pending.len(),
            processing: flag.active,
            in_flight: flag.event_id,
            failed: failed.iter().map(FailedEventView::from).collect(),
            pii: audit_pii_exposure(&retained),
        })
    }

    pub fn needs_attention(&self) -> bool {
        !self.failed.is_empty()
    }
}
