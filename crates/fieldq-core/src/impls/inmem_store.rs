//! InMemoryQueueStore - volatile queue store.
//!
//! Used as the test fake and for hosts without a filesystem. The map holds
//! only durable-shaped records (never `Processing`), so `durable_snapshot`
//! is exactly what a persistent store would have on disk at that moment.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::processing::ProcessingCell;
use crate::domain::{
    EventId, EventStatus, NewEvent, QueuedEvent, StatusTransition, StoreError,
};
use crate::ports::{
    Clock, IdGenerator, ProcessingFlag, QueueCounts, QueueStore, SystemClock, UlidGenerator,
};

pub struct InMemoryQueueStore {
    events: Mutex<HashMap<EventId, QueuedEvent>>,
    processing: ProcessingCell,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    fail_writes: AtomicBool,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            processing: ProcessingCell::default(),
            ids: Arc::new(UlidGenerator::new(clock.clone())),
            clock,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Rebuild a store from what a previous process left behind.
    ///
    /// Completed leftovers (a crash between `Completed` and `remove_event`) are
    /// dropped; they were already delivered.
    pub fn from_snapshot(events: Vec<QueuedEvent>, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::with_clock(clock);
        let map = events
            .into_iter()
            .map(|e| e.durable())
            .filter(|e| e.status != EventStatus::Completed)
            .map(|e| (e.id, e))
            .collect();
        store.events = Mutex::new(map);
        store
    }

    /// Everything that would survive a process restart, oldest first.
    pub async fn durable_snapshot(&self) -> Vec<QueuedEvent> {
        let events = self.events.lock().await;
        sorted(events.values().cloned())
    }

    /// Make every subsequent write fail with `StoreError::Database`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("write rejected (injected)".into()));
        }
        Ok(())
    }

    async fn list(&self, status: EventStatus) -> Vec<QueuedEvent> {
        let events = self.events.lock().await;
        sorted(
            events
                .values()
                .cloned()
                .map(|e| self.processing.overlay(e))
                .filter(|e| e.status == status),
        )
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(events: impl Iterator<Item = QueuedEvent>) -> Vec<QueuedEvent> {
    let mut events: Vec<_> = events.collect();
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    events
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn add_event(&self, event: NewEvent) -> Result<EventId, StoreError> {
        self.check_writable()?;
        let id = self.ids.generate_event_id();
        let record = QueuedEvent::new(id, event, self.clock.now());
        self.events.lock().await.insert(id, record);
        Ok(id)
    }

    async fn get_pending_events(&self) -> Result<Vec<QueuedEvent>, StoreError> {
        Ok(self.list(EventStatus::Pending).await)
    }

    async fn get_failed_events(&self) -> Result<Vec<QueuedEvent>, StoreError> {
        Ok(self.list(EventStatus::Failed).await)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<QueuedEvent>, StoreError> {
        let events = self.events.lock().await;
        Ok(events.get(&id).cloned().map(|e| self.processing.overlay(e)))
    }

    async fn update_event_status(
        &self,
        id: EventId,
        transition: StatusTransition,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut events = self.events.lock().await;
        let stored = events.get(&id).cloned().ok_or(StoreError::NotFound(id))?;

        let mut event = self.processing.overlay(stored);
        event.apply(&transition, self.clock.now())?;

        if transition == StatusTransition::Processing {
            self.processing.mark_in_flight(id);
        } else {
            events.insert(id, event.durable());
            self.processing.settle(id);
        }
        Ok(())
    }

    async fn remove_event(&self, id: EventId) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut events = self.events.lock().await;
        let stored = events.get(&id).map(|e| e.status);
        match stored {
            None => Err(StoreError::NotFound(id)),
            Some(EventStatus::Completed) => {
                events.remove(&id);
                Ok(())
            }
            Some(status) => Err(StoreError::NotCompleted {
                id,
                status: self.processing.overlay_status(id, status),
            }),
        }
    }

    async fn set_processing_flag(
        &self,
        active: bool,
        event_id: Option<EventId>,
    ) -> Result<(), StoreError> {
        self.processing.set(active, event_id);
        Ok(())
    }

    async fn processing_flag(&self) -> Result<ProcessingFlag, StoreError> {
        Ok(self.processing.get())
    }

    async fn try_acquire_processing(&self) -> Result<bool, StoreError> {
        Ok(self.processing.try_acquire())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let events = self.events.lock().await;
        let count = |status: EventStatus| {
            events
                .values()
                .filter(|e| self.processing.overlay_status(e.id, e.status) == status)
                .count()
        };
        Ok(QueueCounts {
            pending: count(EventStatus::Pending),
            failed: count(EventStatus::Failed),
            processing: self.processing.get().active,
        })
    }
}
