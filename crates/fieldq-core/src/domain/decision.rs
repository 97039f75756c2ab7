//! Decision model: what happens to an event after a failed delivery.

use super::errors::{DeliveryError, ErrorKind};
use super::event::QueuedEvent;
use super::state::StatusTransition;

/// The next action for an event whose delivery just failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Back to `Pending`; the next pass tries again.
    Requeue { reason: String },

    /// Terminal. Kept in the store for operator attention.
    MarkFailed { reason: String },
}

impl Decision {
    pub fn into_transition(self) -> StatusTransition {
        match self {
            Decision::Requeue { reason } => StatusTransition::Requeued { error: reason },
            Decision::MarkFailed { reason } => StatusTransition::Failed { error: reason },
        }
    }
}

/// Decides the fate of a failed event.
///
/// Deciders are pure: given the record as it was before the attempt and the
/// failure, they return the next action without touching the store.
pub trait Decider: Send + Sync {
    fn decide(&self, event: &QueuedEvent, error: &DeliveryError) -> Decision;
}

/// Attempt-count based policy.
///
/// - permanent rejection: fail immediately
/// - `retry_count + 1 >= max_retries`: fail
/// - otherwise: requeue with no delay (the next trigger retries)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecider;

impl Decider for DefaultDecider {
    fn decide(&self, event: &QueuedEvent, error: &DeliveryError) -> Decision {
        let attempts = event.retry_count + 1;

        if error.kind() == ErrorKind::Permanent {
            return Decision::MarkFailed {
                reason: format!("{error} (permanent, attempt {attempts})"),
            };
        }

        if attempts >= event.max_retries {
            Decision::MarkFailed {
                reason: format!("{error} (max retries reached: {attempts}/{})", event.max_retries),
            }
        } else {
            Decision::Requeue {
                reason: format!("{error} (attempt {attempts}/{})", event.max_retries),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::NewEvent;
    use crate::domain::ids::EventId;
    use crate::domain::payload::PersonnelStaffingPayload;
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn event(retry_count: u32, max_retries: u32) -> QueuedEvent {
        let payload = PersonnelStaffingPayload {
            user_id: "user-1".into(),
            staffing_type: "1".into(),
            note: String::new(),
            timestamp: Utc::now(),
        };
        let mut e = QueuedEvent::new(
            EventId::from_ulid(Ulid::new()),
            NewEvent::new(payload, max_retries),
            Utc::now(),
        );
        e.retry_count = retry_count;
        e
    }

    #[rstest]
    #[case::first_failure(0, 3, false)]
    #[case::second_failure(1, 3, false)]
    #[case::third_failure(2, 3, true)]
    #[case::single_shot(0, 1, true)]
    fn retry_budget(#[case] retry_count: u32, #[case] max: u32, #[case] terminal: bool) {
        let decision = DefaultDecider.decide(&event(retry_count, max), &DeliveryError::Timeout);
        assert_eq!(matches!(decision, Decision::MarkFailed { .. }), terminal);
    }

    #[test]
    fn permanent_rejection_fails_immediately() {
        let err = DeliveryError::Rejected {
            message: "unknown status".into(),
        };
        let decision = DefaultDecider.decide(&event(0, 3), &err);
        assert!(matches!(decision, Decision::MarkFailed { reason } if reason.contains("permanent")));
    }

    #[test]
    fn requeue_reason_carries_error_text() {
        let err = DeliveryError::Server {
            status: 502,
            message: "bad gateway".into(),
        };
        let transition = DefaultDecider.decide(&event(0, 3), &err).into_transition();
        assert!(matches!(
            transition,
            StatusTransition::Requeued { error } if error.contains("502") && error.contains("1/3")
        ));
    }
}
