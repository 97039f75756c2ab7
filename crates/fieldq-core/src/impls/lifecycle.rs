//! ManualLifecycle - lifecycle events fed in by the host.

use tokio::sync::broadcast;

use crate::ports::{LifecycleEvent, LifecycleSignal};

pub struct ManualLifecycle {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl ManualLifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    /// Broadcast to current subscribers. Returns how many received it.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for ManualLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSignal for ManualLifecycle {
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}
