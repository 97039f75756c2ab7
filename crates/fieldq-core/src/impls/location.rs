//! StaticLocationProvider - a fix set by the host.

use std::sync::Mutex;

use crate::domain::GpsSnapshot;
use crate::ports::LocationProvider;

#[derive(Default)]
pub struct StaticLocationProvider {
    fix: Mutex<Option<GpsSnapshot>>,
}

impl StaticLocationProvider {
    pub fn new(fix: Option<GpsSnapshot>) -> Self {
        Self {
            fix: Mutex::new(fix),
        }
    }

    pub fn set(&self, fix: Option<GpsSnapshot>) {
        if let Ok(mut current) = self.fix.lock() {
            *current = fix;
        }
    }
}

impl LocationProvider for StaticLocationProvider {
    fn current_location(&self) -> Option<GpsSnapshot> {
        self.fix.lock().ok().and_then(|fix| fix.clone())
    }
}
