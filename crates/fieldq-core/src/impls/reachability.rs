//! ManualReachability - connectivity set by the host (or a test).
//!
//! Platform integrations push OS reachability changes through `set_reachable`.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::ports::ReachabilitySource;

pub struct ManualReachability {
    tx: watch::Sender<bool>,
}

impl ManualReachability {
    pub fn new(reachable: bool) -> Self {
        let (tx, _rx) = watch::channel(reachable);
        Self { tx }
    }

    /// Update connectivity. Watchers are only woken on an actual change.
    pub fn set_reachable(&self, reachable: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != reachable;
            *current = reachable;
            changed
        });
    }
}

#[async_trait]
impl ReachabilitySource for ManualReachability {
    async fn is_reachable(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
