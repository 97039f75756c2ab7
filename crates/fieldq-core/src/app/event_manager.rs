//! EventManager - the entry point for actions that must reach the server.
//!
//! Each `save_*` call snapshots its context (timestamp, location) at call
//! time, tries the domain operation directly, and falls back to the queue if
//! that fails. The caller gets an answer right away either way; only a failed
//! write to the queue itself is an error.

use std::sync::Arc;

use tracing::{debug, info};

use super::processor::QueueProcessor;
use crate::domain::location::resolve_gps;
use crate::domain::{
    EnqueueError, EventId, EventPayload, GpsSnapshot, NewEvent, PersonnelStaffingPayload,
    PersonnelStatusPayload, QueueNotification, RoleAssignment, StoreError, Trigger,
    UnitStatusPayload,
};
use crate::impls::Dispatcher;
use crate::ports::{Clock, EventSink, LocationProvider, QueueStore};

/// What happened to a submitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server has it. Nothing was queued.
    Delivered,
    /// Accepted into the queue; the processor owns delivery from here.
    Queued(EventId),
}

impl SubmitOutcome {
    pub fn queued_id(&self) -> Option<EventId> {
        match self {
            SubmitOutcome::Queued(id) => Some(*id),
            SubmitOutcome::Delivered => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonnelStatusInput {
    pub user_id: String,
    pub status_type: String,
    pub note: String,
    pub responding_to: String,
    pub event_id: String,
    /// Overrides the location provider when set.
    pub gps: Option<GpsSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitStatusInput {
    pub unit_id: String,
    pub status_type: String,
    pub note: String,
    pub responding_to: String,
    pub roles: Vec<RoleAssignment>,
    pub gps: Option<GpsSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonnelStaffingInput {
    pub user_id: String,
    pub staffing_type: String,
    pub note: String,
}

pub struct EventManager {
    store: Arc<dyn QueueStore>,
    dispatcher: Dispatcher,
    processor: Arc<QueueProcessor>,
    clock: Arc<dyn Clock>,
    location: Option<Arc<dyn LocationProvider>>,
    sink: Arc<dyn EventSink>,
    max_retries: u32,
}

impl EventManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        dispatcher: Dispatcher,
        processor: Arc<QueueProcessor>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            processor,
            clock,
            location: None,
            sink,
            max_retries,
        }
    }

    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(location);
        self
    }

    fn gps(&self, provided: Option<GpsSnapshot>) -> Option<GpsSnapshot> {
        resolve_gps(provided, || {
            self.location
                .as_ref()
                .and_then(|provider| provider.current_location())
        })
    }

    pub async fn save_personnel_status(
        &self,
        input: PersonnelStatusInput,
    ) -> Result<SubmitOutcome, EnqueueError> {
        let payload = PersonnelStatusPayload {
            user_id: input.user_id,
            status_type: input.status_type,
            note: input.note,
            responding_to: input.responding_to,
            event_id: input.event_id,
            timestamp: self.clock.now(),
            gps: self.gps(input.gps),
        };
        self.submit(payload.into()).await
    }

    pub async fn save_unit_status(
        &self,
        input: UnitStatusInput,
    ) -> Result<SubmitOutcome, EnqueueError> {
        let payload = UnitStatusPayload {
            unit_id: input.unit_id,
            status_type: input.status_type,
            note: input.note,
            responding_to: input.responding_to,
            roles: input.roles,
            timestamp: self.clock.now(),
            gps: self.gps(input.gps),
        };
        self.submit(payload.into()).await
    }

    pub async fn save_personnel_staffing(
        &self,
        input: PersonnelStaffingInput,
    ) -> Result<SubmitOutcome, EnqueueError> {
        let payload = PersonnelStaffingPayload {
            user_id: input.user_id,
            staffing_type: input.staffing_type,
            note: input.note,
            timestamp: self.clock.now(),
        };
        self.submit(payload.into()).await
    }

    /// Queue without trying the server first.
    pub async fn enqueue(&self, payload: impl Into<EventPayload>) -> Result<EventId, EnqueueError> {
        Ok(self.persist(payload.into()).await?)
    }

    async fn submit(&self, payload: EventPayload) -> Result<SubmitOutcome, EnqueueError> {
        let event_type = payload.event_type();
        let delivery = match self.dispatcher.dispatch(&payload).await {
            Ok(()) => {
                debug!(%event_type, "delivered directly");
                return Ok(SubmitOutcome::Delivered);
            }
            Err(err) => err,
        };

        info!(%event_type, error = %delivery, "direct delivery failed; queueing");
        let id = self
            .persist(payload)
            .await
            .map_err(|source| EnqueueError::Store { delivery, source })?;
        Ok(SubmitOutcome::Queued(id))
    }

    async fn persist(&self, payload: EventPayload) -> Result<EventId, StoreError> {
        let event_type = payload.event_type();
        let id = self
            .store
            .add_event(NewEvent::new(payload, self.max_retries))
            .await?;

        info!(event_id = %id, %event_type, "event queued");
        self.sink
            .emit(QueueNotification::EventQueued { id, event_type });

        // best effort; connectivity and lifecycle triggers cover a miss
        self.processor.trigger(Trigger::Enqueued);
        Ok(id)
    }
}
