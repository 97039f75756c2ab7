//! PII handling for queued payloads.
//!
//! Queued events hold user ids, free-text notes and coordinates. Anything that
//! goes to logs or diagnostics passes through `sanitize_payload` first.

use serde::Serialize;
use serde_json::{Map, Value};

use super::event::QueuedEvent;
use super::location::GpsSnapshot;
use super::payload::EventPayload;

const REDACTED: &str = "[REDACTED]";

/// Does this payload carry anything that identifies a person or place?
pub fn contains_pii(payload: &EventPayload) -> bool {
    let gps_present = |gps: &Option<GpsSnapshot>| gps.is_some();
    match payload {
        EventPayload::PersonnelStatus(p) => {
            !p.user_id.is_empty() || !p.note.is_empty() || gps_present(&p.gps)
        }
        EventPayload::UnitStatus(p) => {
            !p.note.is_empty() || !p.roles.is_empty() || gps_present(&p.gps)
        }
        EventPayload::PersonnelStaffing(p) => !p.user_id.is_empty() || !p.note.is_empty(),
    }
}

/// A log-safe JSON view of a payload.
///
/// - user ids are removed (including those inside unit roles)
/// - non-empty notes become `[REDACTED]`
/// - coordinates are rounded to two decimals (roughly 1 km)
pub fn sanitize_payload(payload: &EventPayload) -> Value {
    let mut value = match serde_json::to_value(payload) {
        Ok(v) => v,
        Err(_) => return Value::String(REDACTED.to_string()),
    };

    if let Some(data) = value.get_mut("data").and_then(Value::as_object_mut) {
        scrub(data);
    }
    value
}

fn scrub(data: &mut Map<String, Value>) {
    data.remove("user_id");

    if let Some(note) = data.get_mut("note")
        && note.as_str().is_some_and(|s| !s.is_empty())
    {
        *note = Value::String(REDACTED.to_string());
    }

    if let Some(roles) = data.get_mut("roles").and_then(Value::as_array_mut) {
        for role in roles.iter_mut().filter_map(Value::as_object_mut) {
            role.remove("user_id");
        }
    }

    if let Some(gps) = data.get_mut("gps").and_then(Value::as_object_mut) {
        for key in ["latitude", "longitude"] {
            if let Some(coord) = gps.get(key).and_then(Value::as_f64) {
                gps.insert(key.to_string(), Value::from(round2(coord)));
            }
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PiiAudit {
    pub total_events: usize,
    pub events_with_pii: usize,
    pub risk_level: RiskLevel,
}

/// Summarise how much of the retained queue carries PII.
///
/// More than half the events: high. More than a fifth: medium.
pub fn audit_pii_exposure(events: &[QueuedEvent]) -> PiiAudit {
    let events_with_pii = events.iter().filter(|e| contains_pii(&e.payload)).count();

    let risk_level = if events.is_empty() {
        RiskLevel::Low
    } else {
        let pct = events_with_pii as f64 * 100.0 / events.len() as f64;
        if pct > 50.0 {
            RiskLevel::High
        } else if pct > 20.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    };

    PiiAudit {
        total_events: events.len(),
        events_with_pii,
        risk_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::NewEvent;
    use crate::domain::ids::EventId;
    use crate::domain::payload::{
        PersonnelStaffingPayload, PersonnelStatusPayload, RoleAssignment, UnitStatusPayload,
    };
    use chrono::Utc;
    use ulid::Ulid;

    fn personnel() -> EventPayload {
        EventPayload::PersonnelStatus(PersonnelStatusPayload {
            user_id: "user-123".into(),
            status_type: "Available".into(),
            note: "Ready for duty".into(),
            responding_to: String::new(),
            event_id: String::new(),
            timestamp: Utc::now(),
            gps: Some(GpsSnapshot::new(40.7128, -74.006).with_accuracy(5.0)),
        })
    }

    fn anonymous_unit() -> EventPayload {
        EventPayload::UnitStatus(UnitStatusPayload {
            unit_id: "unit-9".into(),
            status_type: "2".into(),
            note: String::new(),
            responding_to: String::new(),
            roles: vec![],
            timestamp: Utc::now(),
            gps: None,
        })
    }

    fn queued(payload: EventPayload) -> QueuedEvent {
        QueuedEvent::new(
            EventId::from_ulid(Ulid::new()),
            NewEvent::new(payload, 3),
            Utc::now(),
        )
    }

    #[test]
    fn detects_pii() {
        assert!(contains_pii(&personnel()));
        assert!(!contains_pii(&anonymous_unit()));
    }

    #[test]
    fn unit_roles_count_as_pii() {
        let EventPayload::UnitStatus(mut unit) = anonymous_unit() else {
            unreachable!()
        };
        unit.roles.push(RoleAssignment {
            role_id: "r1".into(),
            user_id: "u1".into(),
        });
        assert!(contains_pii(&EventPayload::UnitStatus(unit)));
    }

    #[test]
    fn sanitize_masks_fields() {
        let v = sanitize_payload(&personnel());
        let data = &v["data"];

        assert!(data.get("user_id").is_none());
        assert_eq!(data["note"], "[REDACTED]");
        assert_eq!(data["gps"]["latitude"], 40.71);
        assert_eq!(data["gps"]["longitude"], -74.01);
        assert_eq!(data["gps"]["accuracy"], 5.0);
        assert_eq!(data["status_type"], "Available");
    }

    #[test]
    fn sanitize_keeps_empty_note_empty() {
        let payload = EventPayload::PersonnelStaffing(PersonnelStaffingPayload {
            user_id: "user-1".into(),
            staffing_type: "1".into(),
            note: String::new(),
            timestamp: Utc::now(),
        });
        assert_eq!(sanitize_payload(&payload)["data"]["note"], "");
    }

    #[test]
    fn audit_classifies_risk() {
        let mixed = vec![queued(personnel()), queued(anonymous_unit()), queued(personnel())];
        let audit = audit_pii_exposure(&mixed);
        assert_eq!(audit.total_events, 3);
        assert_eq!(audit.events_with_pii, 2);
        assert_eq!(audit.risk_level, RiskLevel::High);

        let mostly_clean = vec![
            queued(personnel()),
            queued(anonymous_unit()),
            queued(anonymous_unit()),
        ];
        assert_eq!(audit_pii_exposure(&mostly_clean).risk_level, RiskLevel::Medium);

        assert_eq!(audit_pii_exposure(&[]).risk_level, RiskLevel::Low);
    }
}
