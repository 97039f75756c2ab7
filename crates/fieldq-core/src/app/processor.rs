//! QueueProcessor - drains pending events against the domain API.
//!
//! # Pass
//! 1. Check: something is pending and the network is reachable. Otherwise
//!    skip without side effects.
//! 2. Acquire the processing flag. A pass already holding it means skip.
//! 3. Snapshot the pending list (oldest first) and attempt each event once:
//!    Processing → dispatch → Completed + removed, or the `Decider`'s
//!    Requeued / Failed.
//! 4. Release the flag, whatever happened in 3.
//!
//! Events enqueued during a pass are not in its snapshot; the enqueue
//! trigger (or the next organic one) picks them up.
//!
//! A failed delivery never stops the pass. A failed store operation does: the
//! durability guarantee is gone, so the pass aborts with `ProcessError`.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::pii::sanitize_payload;
use crate::domain::{
    Decider, Decision, DefaultDecider, PassId, ProcessError, QueueNotification, QueuedEvent,
    StatusTransition, Trigger,
};
use crate::impls::{Dispatcher, TracingEventSink};
use crate::ports::{
    BackgroundExecutor, EventSink, IdGenerator, LifecycleSignal, QueueStore, ReachabilitySource,
    SystemClock, UlidGenerator,
};

/// Why a pass did nothing. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NothingPending,
    Offline,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Skipped(SkipReason),
    Ran {
        completed: usize,
        requeued: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass_id: PassId,
    pub trigger: Trigger,
    pub outcome: PassOutcome,
}

impl PassReport {
    pub fn ran(&self) -> bool {
        matches!(self.outcome, PassOutcome::Ran { .. })
    }
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    requeued: usize,
    failed: usize,
}

enum Attempt {
    Completed,
    Requeued,
    Failed,
}

pub struct QueueProcessor {
    store: Arc<dyn QueueStore>,
    dispatcher: Dispatcher,
    reachability: Arc<dyn ReachabilitySource>,
    decider: Arc<dyn Decider>,
    sink: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
    pub(crate) lifecycle: Option<Arc<dyn LifecycleSignal>>,
    pub(crate) background: Option<Arc<dyn BackgroundExecutor>>,
    pub(crate) background_label: String,
}

impl QueueProcessor {
    pub fn new(
        store: Arc<dyn QueueStore>,
        dispatcher: Dispatcher,
        reachability: Arc<dyn ReachabilitySource>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            reachability,
            decider: Arc::new(DefaultDecider),
            sink: Arc::new(TracingEventSink),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            lifecycle: None,
            background: None,
            background_label: "fieldq-drain".to_string(),
        }
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Lifecycle triggers for `start`. Background passes are bracketed with an
    /// execution window from `background`, requested under `label`.
    pub fn with_lifecycle(
        mut self,
        lifecycle: Arc<dyn LifecycleSignal>,
        background: Arc<dyn BackgroundExecutor>,
        label: impl Into<String>,
    ) -> Self {
        self.lifecycle = Some(lifecycle);
        self.background = Some(background);
        self.background_label = label.into();
        self
    }

    pub(crate) fn reachability(&self) -> &Arc<dyn ReachabilitySource> {
        &self.reachability
    }

    /// Run one pass now, if there is anything to do.
    pub async fn run_pass(&self, trigger: Trigger) -> Result<PassReport, ProcessError> {
        let pass_id = self.ids.generate_pass_id();
        let report = |outcome| PassReport {
            pass_id,
            trigger,
            outcome,
        };
        let skip = |reason| {
            debug!(%pass_id, ?trigger, ?reason, "queue pass skipped");
            report(PassOutcome::Skipped(reason))
        };

        if self.store.get_pending_events().await?.is_empty() {
            return Ok(skip(SkipReason::NothingPending));
        }
        if !self.reachability.is_reachable().await {
            return Ok(skip(SkipReason::Offline));
        }
        if !self.store.try_acquire_processing().await? {
            return Ok(skip(SkipReason::AlreadyRunning));
        }

        let drained = self.drain(pass_id, trigger).await;
        let released = self.store.set_processing_flag(false, None).await;

        let tally = match (drained, released) {
            // drained by a pass that finished between our check and acquire
            (Ok(None), Ok(())) => return Ok(skip(SkipReason::NothingPending)),
            (Ok(Some(tally)), Ok(())) => tally,
            (Ok(_), Err(err)) => return Err(err.into()),
            (Err(err), released) => {
                if let Err(release_err) = released {
                    error!(%pass_id, error = %release_err, "could not release processing flag");
                }
                return Err(err);
            }
        };

        info!(
            %pass_id,
            ?trigger,
            completed = tally.completed,
            requeued = tally.requeued,
            failed = tally.failed,
            "queue pass finished"
        );
        self.sink.emit(QueueNotification::PassFinished {
            pass_id,
            completed: tally.completed,
            requeued: tally.requeued,
            failed: tally.failed,
        });

        Ok(report(PassOutcome::Ran {
            completed: tally.completed,
            requeued: tally.requeued,
            failed: tally.failed,
        }))
    }

    /// Ask for a pass without waiting for it. Runs on the tokio runtime; a
    /// trigger that lands while a pass is running is a no-op.
    pub fn trigger(self: &Arc<Self>, trigger: Trigger) -> JoinHandle<Option<PassReport>> {
        let processor = Arc::clone(self);
        tokio::spawn(async move { processor.run_logged(trigger).await })
    }

    pub(crate) async fn run_logged(&self, trigger: Trigger) -> Option<PassReport> {
        match self.run_pass(trigger).await {
            Ok(report) => Some(report),
            Err(err) => {
                error!(?trigger, error = %err, "queue pass failed");
                None
            }
        }
    }

    async fn drain(
        &self,
        pass_id: PassId,
        trigger: Trigger,
    ) -> Result<Option<Tally>, ProcessError> {
        let snapshot = self.store.get_pending_events().await?;
        if snapshot.is_empty() {
            return Ok(None);
        }
        info!(%pass_id, ?trigger, pending = snapshot.len(), "queue pass started");
        self.sink.emit(QueueNotification::PassStarted {
            pass_id,
            trigger,
            pending: snapshot.len(),
        });

        let mut tally = Tally::default();
        for event in &snapshot {
            match self.attempt(pass_id, event).await? {
                Attempt::Completed => tally.completed += 1,
                Attempt::Requeued => tally.requeued += 1,
                Attempt::Failed => tally.failed += 1,
            }
        }
        Ok(Some(tally))
    }

    async fn attempt(&self, pass_id: PassId, event: &QueuedEvent) -> Result<Attempt, ProcessError> {
        let id = event.id;
        if event.retries_exhausted() {
            let reason = format!(
                "retry budget exhausted before attempt ({}/{})",
                event.retry_count, event.max_retries
            );
            self.store
                .update_event_status(
                    id,
                    StatusTransition::Exhausted {
                        error: reason.clone(),
                    },
                )
                .await?;
            self.report_failed(pass_id, event, event.retry_count, reason);
            return Ok(Attempt::Failed);
        }

        self.store
            .update_event_status(id, StatusTransition::Processing)
            .await?;

        debug!(
            %pass_id,
            event_id = %id,
            event_type = %event.event_type,
            retry_count = event.retry_count,
            payload = %sanitize_payload(&event.payload),
            "dispatching queued event"
        );

        let error = match self.dispatcher.dispatch(&event.payload).await {
            Ok(()) => {
                self.store
                    .update_event_status(id, StatusTransition::Completed)
                    .await?;
                self.store.remove_event(id).await?;

                debug!(%pass_id, event_id = %id, "queued event delivered");
                self.sink.emit(QueueNotification::EventCompleted {
                    id,
                    event_type: event.event_type,
                });
                return Ok(Attempt::Completed);
            }
            Err(error) => error,
        };

        let retry_count = event.retry_count + 1;
        let decision = self.decider.decide(event, &error);
        let terminal = matches!(decision, Decision::MarkFailed { .. });
        let transition = decision.into_transition();
        let reason = transition.error().unwrap_or_default().to_string();

        self.store.update_event_status(id, transition).await?;

        if terminal {
            self.report_failed(pass_id, event, retry_count, reason);
            Ok(Attempt::Failed)
        } else {
            info!(%pass_id, event_id = %id, retry_count, error = %reason, "queued event requeued");
            self.sink.emit(QueueNotification::EventRequeued {
                id,
                retry_count,
                error: reason,
            });
            Ok(Attempt::Requeued)
        }
    }

    fn report_failed(&self, pass_id: PassId, event: &QueuedEvent, retry_count: u32, reason: String) {
        warn!(
            %pass_id,
            event_id = %event.id,
            event_type = %event.event_type,
            retry_count,
            error = %reason,
            "queued event failed"
        );
        self.sink.emit(QueueNotification::EventFailed {
            id: event.id,
            event_type: event.event_type,
            retry_count,
            error: reason,
        });
    }
}
