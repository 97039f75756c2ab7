//! Process-local processing flag shared by the store implementations.
//!
//! The flag is deliberately not part of any durable state: a restart clears it,
//! and with it the `Processing` status of whatever event it named.

use std::sync::{Mutex, MutexGuard};

use crate::domain::{EventId, EventStatus, QueuedEvent};
use crate::ports::ProcessingFlag;

#[derive(Debug, Default)]
pub(crate) struct ProcessingCell {
    flag: Mutex<ProcessingFlag>,
}

impl ProcessingCell {
    fn lock(&self) -> MutexGuard<'_, ProcessingFlag> {
        // The guarded value is two plain fields; a poisoned lock still holds a usable one.
        self.flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn get(&self) -> ProcessingFlag {
        *self.lock()
    }

    pub(crate) fn set(&self, active: bool, event_id: Option<EventId>) {
        *self.lock() = ProcessingFlag { active, event_id };
    }

    pub(crate) fn try_acquire(&self) -> bool {
        let mut flag = self.lock();
        if flag.active {
            return false;
        }
        *flag = ProcessingFlag {
            active: true,
            event_id: None,
        };
        true
    }

    pub(crate) fn mark_in_flight(&self, id: EventId) {
        self.lock().event_id = Some(id);
    }

    /// Forget `id` as the in-flight event, if it is the one named.
    pub(crate) fn settle(&self, id: EventId) {
        let mut flag = self.lock();
        if flag.event_id == Some(id) {
            flag.event_id = None;
        }
    }

    pub(crate) fn in_flight(&self) -> Option<EventId> {
        self.lock().event_id
    }

    /// The stored record as callers should see it: `Processing` while the flag
    /// names it.
    pub(crate) fn overlay(&self, mut event: QueuedEvent) -> QueuedEvent {
        event.status = self.overlay_status(event.id, event.status);
        event
    }

    pub(crate) fn overlay_status(&self, id: EventId, stored: EventStatus) -> EventStatus {
        if stored == EventStatus::Pending && self.in_flight() == Some(id) {
            EventStatus::Processing
        } else {
            stored
        }
    }
}
