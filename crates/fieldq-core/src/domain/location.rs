//! GPS snapshot captured alongside a status change.

use serde::{Deserialize, Serialize};

/// A position fix frozen at enqueue time.
///
/// Replay always sends this exact snapshot; it is never refreshed from the
/// live sensor when the event is finally delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsSnapshot {
    pub latitude: f64,
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl GpsSnapshot {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            speed: None,
            heading: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }
}

/// Picks the snapshot to store with an event.
///
/// Precedence: the caller's own fix, then the live location, then nothing.
pub fn resolve_gps(
    provided: Option<GpsSnapshot>,
    live: impl FnOnce() -> Option<GpsSnapshot>,
) -> Option<GpsSnapshot> {
    provided.or_else(live)
}
