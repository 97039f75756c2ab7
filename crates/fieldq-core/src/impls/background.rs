//! RecordingBackgroundExecutor - `BackgroundExecutor` for hosts without an
//! OS background facility, and for tests.
//!
//! Grants every execution window and records what was asked of it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::BackgroundError;
use crate::ports::{BackgroundExecutor, BackgroundTaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundCall {
    Begin { id: BackgroundTaskId, label: String },
    End(BackgroundTaskId),
    RegisterPeriodic(Duration),
    UnregisterPeriodic,
}

#[derive(Default)]
pub struct RecordingBackgroundExecutor {
    next_id: AtomicU64,
    calls: Mutex<Vec<BackgroundCall>>,
    unavailable: bool,
}

impl RecordingBackgroundExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that refuses every request, like a device with background
    /// refresh turned off.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<BackgroundCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: BackgroundCall) {
        debug!(?call, "background executor call");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self) -> Result<(), BackgroundError> {
        if self.unavailable {
            return Err(BackgroundError::Unavailable(
                "background execution disabled".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BackgroundExecutor for RecordingBackgroundExecutor {
    async fn begin_task(&self, label: &str) -> Result<BackgroundTaskId, BackgroundError> {
        self.check()?;
        let id = BackgroundTaskId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(BackgroundCall::Begin {
            id,
            label: label.to_string(),
        });
        Ok(id)
    }

    async fn end_task(&self, id: BackgroundTaskId) {
        self.record(BackgroundCall::End(id));
    }

    async fn register_periodic(&self, interval: Duration) -> Result<(), BackgroundError> {
        self.check()?;
        self.record(BackgroundCall::RegisterPeriodic(interval));
        Ok(())
    }

    async fn unregister_periodic(&self) {
        self.record(BackgroundCall::UnregisterPeriodic);
    }
}
