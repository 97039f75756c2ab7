//! Queued event record: payload + retry bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StoreError;
use super::ids::EventId;
use super::payload::{EventPayload, EventType};
use super::state::{EventStatus, StatusTransition};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Request to persist a new event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub payload: EventPayload,
    pub max_retries: u32,
}

impl NewEvent {
    pub fn new(payload: impl Into<EventPayload>, max_retries: u32) -> Self {
        Self {
            payload: payload.into(),
            max_retries,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// One replayable user action.
///
/// Design:
/// - The store holds these records; nothing else keeps a mutable copy across
///   an await point.
/// - All status changes go through `apply`, so every store enforces the same
///   state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub id: EventId,
    pub event_type: EventType,
    pub payload: EventPayload,
    pub status: EventStatus,

    /// Failed delivery attempts so far.
    pub retry_count: u32,

    /// Reaching this many failed attempts makes the event terminal.
    pub max_retries: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedEvent {
    pub fn new(id: EventId, new: NewEvent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            event_type: new.payload.event_type(),
            payload: new.payload,
            status: EventStatus::Pending,
            retry_count: 0,
            max_retries: new.max_retries,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// Has this event used up its automatic attempts?
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Apply a transition in place. The record is untouched on error.
    pub fn apply(
        &mut self,
        transition: &StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.status != transition.from_status() {
            return Err(StoreError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: transition.to_status(),
            });
        }

        match transition {
            StatusTransition::Processing => {}
            StatusTransition::Completed => self.last_error = None,
            StatusTransition::Requeued { error }
            | StatusTransition::Failed { error }
            | StatusTransition::Exhausted { error } => self.last_error = Some(error.clone()),
            StatusTransition::ManualRetry => {
                self.retry_count = 0;
                self.last_error = None;
            }
        }
        if transition.is_failed_attempt() {
            self.retry_count += 1;
        }
        self.status = transition.to_status();
        self.updated_at = now;
        Ok(())
    }

    /// The record as it may be written to durable storage.
    ///
    /// `Processing` is never persisted; it is written back as `Pending`, so a
    /// crash mid-delivery leaves the event ready for the next pass.
    pub fn durable(&self) -> QueuedEvent {
        let mut record = self.clone();
        if record.status == EventStatus::Processing {
            record.status = EventStatus::Pending;
        }
        record
    }
}
