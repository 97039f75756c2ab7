//! Typed payloads for every queueable action.
//!
//! Adding a new queueable action means one new `EventType` variant, one new
//! `EventPayload` variant and one new `DomainApi` method. Nothing dispatches
//! on strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::location::GpsSnapshot;

/// Closed set of domain operations an event can replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PersonnelStatus,
    UnitStatus,
    PersonnelStaffing,
}

impl EventType {
    /// Stable discriminator stored in the `event_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::PersonnelStatus => "personnel_status",
            EventType::UnitStatus => "unit_status",
            EventType::PersonnelStaffing => "personnel_staffing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "personnel_status" => Some(EventType::PersonnelStatus),
            "unit_status" => Some(EventType::UnitStatus),
            "personnel_staffing" => Some(EventType::PersonnelStaffing),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "I am now responding" and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelStatusPayload {
    pub user_id: String,
    pub status_type: String,
    #[serde(default)]
    pub note: String,
    /// Call or station id the user is responding to; empty when none.
    #[serde(default)]
    pub responding_to: String,
    #[serde(default)]
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsSnapshot>,
}

/// A person filling a role on a unit at the time of the status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStatusPayload {
    pub unit_id: String,
    pub status_type: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub responding_to: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleAssignment>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelStaffingPayload {
    pub user_id: String,
    pub staffing_type: String,
    #[serde(default)]
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Type-tagged payload. Serialized as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    PersonnelStatus(PersonnelStatusPayload),
    UnitStatus(UnitStatusPayload),
    PersonnelStaffing(PersonnelStaffingPayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::PersonnelStatus(_) => EventType::PersonnelStatus,
            EventPayload::UnitStatus(_) => EventType::UnitStatus,
            EventPayload::PersonnelStaffing(_) => EventType::PersonnelStaffing,
        }
    }

    /// When the user performed the action (not when it was delivered).
    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            EventPayload::PersonnelStatus(p) => p.timestamp,
            EventPayload::UnitStatus(p) => p.timestamp,
            EventPayload::PersonnelStaffing(p) => p.timestamp,
        }
    }
}

impl From<PersonnelStatusPayload> for EventPayload {
    fn from(p: PersonnelStatusPayload) -> Self {
        EventPayload::PersonnelStatus(p)
    }
}

impl From<UnitStatusPayload> for EventPayload {
    fn from(p: UnitStatusPayload) -> Self {
        EventPayload::UnitStatus(p)
    }
}

impl From<PersonnelStaffingPayload> for EventPayload {
    fn from(p: PersonnelStaffingPayload) -> Self {
        EventPayload::PersonnelStaffing(p)
    }
}

/// `Tue, 01 Oct 2024 12:00:00 GMT`, the form the backend expects in
/// `TimestampUtc` fields.
pub fn http_date(ts: DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
