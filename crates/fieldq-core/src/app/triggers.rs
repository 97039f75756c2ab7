//! Trigger wiring: connectivity and lifecycle signals become passes.
//!
//! Every listener runs as its own task and is owned by a `Subscription`.
//! Dropping or unsubscribing aborts the listener immediately; passes it has
//! already spawned run to completion so the processing flag is always
//! released.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::processor::QueueProcessor;
use crate::domain::Trigger;
use crate::ports::{BackgroundExecutor, LifecycleEvent};

/// Handle for one listener task.
#[must_use = "dropping a Subscription stops its listener"]
pub struct Subscription {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn spawn<F>(name: &'static str, listener: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            handle: Some(tokio::spawn(listener)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Still listening? False after the signal source closed or after abort.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop listening. Takes effect before this returns: no trigger from this
    /// subscription fires afterwards.
    pub fn unsubscribe(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(subscription = self.name, "unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.abort();
    }
}

/// All listeners installed by `QueueProcessor::start`.
#[must_use = "dropping TriggerSubscriptions stops every listener"]
pub struct TriggerSubscriptions {
    subscriptions: Vec<Subscription>,
}

impl TriggerSubscriptions {
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.subscriptions.iter().map(Subscription::name).collect()
    }

    pub fn unsubscribe_all(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl QueueProcessor {
    /// Subscribe to connectivity and (if configured) lifecycle signals.
    pub fn start(self: Arc<Self>) -> TriggerSubscriptions {
        let mut subscriptions = vec![watch_connectivity(
            Arc::clone(&self),
            self.reachability().watch(),
        )];

        if let (Some(lifecycle), Some(background)) = (&self.lifecycle, &self.background) {
            subscriptions.push(watch_lifecycle(
                Arc::clone(&self),
                lifecycle.subscribe(),
                Arc::clone(background),
            ));
        }

        TriggerSubscriptions { subscriptions }
    }
}

fn watch_connectivity(
    processor: Arc<QueueProcessor>,
    mut rx: watch::Receiver<bool>,
) -> Subscription {
    // read before spawning so a change racing the spawn is still an edge
    let mut was_reachable = *rx.borrow_and_update();
    Subscription::spawn("connectivity", async move {
        while rx.changed().await.is_ok() {
            let reachable = *rx.borrow_and_update();
            if reachable && !was_reachable {
                info!("connectivity restored");
                processor.trigger(Trigger::ConnectivityRestored);
            }
            was_reachable = reachable;
        }
    })
}

fn watch_lifecycle(
    processor: Arc<QueueProcessor>,
    mut rx: broadcast::Receiver<LifecycleEvent>,
    background: Arc<dyn BackgroundExecutor>,
) -> Subscription {
    Subscription::spawn("lifecycle", async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "lifecycle listener fell behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            debug!(?event, "lifecycle event");
            match event {
                LifecycleEvent::BecameActive => {
                    processor.trigger(Trigger::BecameActive);
                }
                LifecycleEvent::PeriodicWake => {
                    processor.trigger(Trigger::PeriodicWake);
                }
                LifecycleEvent::EnteredBackground => {
                    drain_in_background(Arc::clone(&processor), Arc::clone(&background));
                }
                // Nothing to flush: in-flight state is never persisted.
                LifecycleEvent::Terminating => break,
            }
        }
    })
}

/// Run a pass inside an OS execution window, so it can finish after the app
/// is suspended. Without a window the pass still runs; it may just be cut off.
fn drain_in_background(processor: Arc<QueueProcessor>, background: Arc<dyn BackgroundExecutor>) {
    tokio::spawn(async move {
        let window = match background.begin_task(&processor.background_label).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(error = %err, "no background window; draining anyway");
                None
            }
        };

        processor.run_logged(Trigger::EnteredBackground).await;

        if let Some(id) = window {
            background.end_task(id).await;
        }
    });
}
