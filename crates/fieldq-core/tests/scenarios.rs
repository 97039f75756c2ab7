//! End-to-end queue scenarios, run against both store implementations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rstest::rstest;
use tokio::sync::broadcast;

use fieldq_core::app::{PersonnelStatusInput, UnitStatusInput};
use fieldq_core::domain::{
    DeliveryError, EventId, EventPayload, EventStatus, EventType, NewEvent,
    PersonnelStaffingPayload, QueueNotification, StatusTransition, Trigger, UnitStatusPayload,
};
use fieldq_core::impls::{
    BroadcastEventSink, InMemoryQueueStore, ManualLifecycle, ManualReachability,
    RecordingBackgroundExecutor, ScriptedDomainApi, SqliteQueueStore,
};
use fieldq_core::ports::{Clock, FixedClock, QueueStore};
use fieldq_core::{Engine, PassOutcome, SkipReason, SubmitOutcome};

#[derive(Debug, Clone, Copy)]
enum StoreKind {
    Memory,
    Sqlite,
}

struct Harness {
    engine: Engine,
    store: Arc<dyn QueueStore>,
    api: Arc<ScriptedDomainApi>,
    net: Arc<ManualReachability>,
    sink: Arc<BroadcastEventSink>,
    clock: Arc<FixedClock>,
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 9, 1, 6, 0, 0).unwrap(),
    ))
}

async fn open_store(kind: StoreKind, clock: Arc<FixedClock>) -> Arc<dyn QueueStore> {
    match kind {
        StoreKind::Memory => Arc::new(InMemoryQueueStore::with_clock(clock)),
        StoreKind::Sqlite => Arc::new(
            SqliteQueueStore::in_memory()
                .await
                .unwrap()
                .with_clock(clock),
        ),
    }
}

fn harness_with(
    store: Arc<dyn QueueStore>,
    api: ScriptedDomainApi,
    online: bool,
    clock: Arc<FixedClock>,
) -> Harness {
    let api = Arc::new(api);
    let net = Arc::new(ManualReachability::new(online));
    let sink = Arc::new(BroadcastEventSink::default());
    let engine = Engine::builder()
        .store(store.clone())
        .api(api.clone())
        .reachability(net.clone())
        .lifecycle(Arc::new(ManualLifecycle::new()))
        .background(Arc::new(RecordingBackgroundExecutor::new()))
        .sink(sink.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    Harness {
        engine,
        store,
        api,
        net,
        sink,
        clock,
    }
}

async fn harness(kind: StoreKind, online: bool) -> Harness {
    let clock = clock();
    let store = open_store(kind, clock.clone()).await;
    harness_with(store, ScriptedDomainApi::new(), online, clock)
}

fn staffing(user: &str, max_retries: u32) -> NewEvent {
    NewEvent::new(
        PersonnelStaffingPayload {
            user_id: user.into(),
            staffing_type: "On Shift".into(),
            note: String::new(),
            timestamp: Utc::now(),
        },
        max_retries,
    )
}

impl Harness {
    /// Queue directly, one second apart, so creation order is unambiguous.
    async fn add(&self, event: NewEvent) -> EventId {
        let id = self.store.add_event(event).await.unwrap();
        self.clock.advance(chrono::Duration::seconds(1));
        id
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<QueueNotification>,
        pred: impl Fn(&QueueNotification) -> bool,
    ) -> QueueNotification {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let n = rx.recv().await.unwrap();
                if pred(&n) {
                    return n;
                }
            }
        })
        .await
        .unwrap()
    }
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn happy_path_offline_then_online(#[case] kind: StoreKind) {
    let h = harness(kind, false).await;
    h.api.fail_next(
        EventType::PersonnelStatus,
        DeliveryError::Transport("no route to host".into()),
    );
    let mut rx = h.sink.subscribe();

    let outcome = h
        .engine
        .manager()
        .save_personnel_status(PersonnelStatusInput {
            user_id: "user-3".into(),
            status_type: "Responding".into(),
            responding_to: "call-77".into(),
            event_id: "call-77".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let id = outcome.queued_id().unwrap();

    // offline: the enqueue and startup triggers do nothing
    h.engine.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        h.store.get_event(id).await.unwrap().unwrap().status,
        EventStatus::Pending
    );

    h.net.set_reachable(true);
    let finished = Harness::wait_for(&mut rx, |n| {
        matches!(n, QueueNotification::PassFinished { .. })
    })
    .await;
    assert!(matches!(
        finished,
        QueueNotification::PassFinished { completed: 1, .. }
    ));

    assert!(h.store.get_event(id).await.unwrap().is_none());
    assert_eq!(h.api.delivered().len(), 1);

    // exactly one pass ran
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut started = 0;
    while let Ok(n) = rx.try_recv() {
        if matches!(n, QueueNotification::PassStarted { .. }) {
            started += 1;
        }
    }
    assert_eq!(started, 0, "only the pass already observed may run");
    h.engine.shutdown().await;
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn partial_failure_in_a_batch(#[case] kind: StoreKind) {
    let h = harness(kind, true).await;
    let first = h.add(staffing("user-1", 3)).await;
    let second = h
        .add(NewEvent::new(
            UnitStatusPayload {
                unit_id: "rescue-1".into(),
                status_type: "Available".into(),
                note: String::new(),
                responding_to: String::new(),
                roles: vec![],
                timestamp: Utc::now(),
                gps: None,
            },
            3,
        ))
        .await;
    let third = h.add(staffing("user-2", 3)).await;
    h.api.fail_always(
        EventType::UnitStatus,
        DeliveryError::Server {
            status: 500,
            message: "internal".into(),
        },
    );

    let report = h
        .engine
        .processor()
        .run_pass(Trigger::Manual)
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        PassOutcome::Ran {
            completed: 2,
            requeued: 1,
            failed: 0
        }
    );

    assert!(h.store.get_event(first).await.unwrap().is_none());
    assert!(h.store.get_event(third).await.unwrap().is_none());
    let second = h.store.get_event(second).await.unwrap().unwrap();
    assert_eq!(second.status, EventStatus::Pending);
    assert_eq!(second.retry_count, 1);
    assert!(second.last_error.is_some());
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn exhausted_retries_become_terminal(#[case] kind: StoreKind) {
    let h = harness(kind, true).await;
    let id = h.add(staffing("user-9", 3)).await;
    h.api
        .fail_always(EventType::PersonnelStaffing, DeliveryError::Timeout);

    for _ in 0..3 {
        assert!(h.engine.processor().run_pass(Trigger::Manual).await.unwrap().ran());
    }

    let event = h.store.get_event(id).await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Failed);
    assert_eq!(event.retry_count, 3);

    let fourth = h.engine.processor().run_pass(Trigger::Manual).await.unwrap();
    assert_eq!(fourth.outcome, PassOutcome::Skipped(SkipReason::NothingPending));
    assert_eq!(h.api.calls().len(), 3);

    let status = h.engine.status().await.unwrap();
    assert!(status.needs_attention());
    assert_eq!(status.failed[0].id, id);

    // operator retry puts it back with a fresh budget
    h.api.recover(EventType::PersonnelStaffing);
    let mut rx = h.sink.subscribe();
    h.engine.retry_failed(id).await.unwrap();
    let finished = Harness::wait_for(&mut rx, |n| {
        matches!(n, QueueNotification::PassFinished { .. })
    })
    .await;
    assert!(matches!(
        finished,
        QueueNotification::PassFinished { completed: 1, .. }
    ));
    assert!(h.store.get_event(id).await.unwrap().is_none());
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn immediate_success_bypasses_queue(#[case] kind: StoreKind) {
    let h = harness(kind, true).await;

    let outcome = h
        .engine
        .manager()
        .save_unit_status(UnitStatusInput {
            unit_id: "engine-4".into(),
            status_type: "On Scene".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Delivered);
    let counts = h.store.counts().await.unwrap();
    assert_eq!((counts.pending, counts.failed), (0, 0));
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn concurrent_triggers_run_a_single_pass(#[case] kind: StoreKind) {
    let clock = clock();
    let store = open_store(kind, clock.clone()).await;
    let h = harness_with(
        store,
        ScriptedDomainApi::new().with_latency(Duration::from_millis(30)),
        true,
        clock,
    );
    h.add(staffing("user-1", 3)).await;
    h.add(staffing("user-2", 3)).await;

    let handles: Vec<_> = (0..5)
        .map(|_| h.engine.processor().trigger(Trigger::Manual))
        .collect();

    let mut ran = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().ran() {
            ran += 1;
        }
    }

    assert_eq!(ran, 1);
    assert_eq!(h.api.calls().len(), 2, "no event dispatched twice");
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn oldest_event_is_attempted_first(#[case] kind: StoreKind) {
    let h = harness(kind, true).await;
    let t1 = h.clock.now();

    // created later, inserted first
    h.clock.advance(chrono::Duration::minutes(5));
    h.store.add_event(staffing("second", 3)).await.unwrap();
    h.clock.set(t1);
    h.store.add_event(staffing("first", 3)).await.unwrap();

    h.engine.processor().run_pass(Trigger::Manual).await.unwrap();

    let users: Vec<_> = h
        .api
        .delivered()
        .into_iter()
        .map(|p| match p {
            EventPayload::PersonnelStaffing(p) => p.user_id,
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert_eq!(users, vec!["first", "second"]);
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::sqlite(StoreKind::Sqlite)]
#[tokio::test]
async fn same_tick_events_replay_in_enqueue_order(#[case] kind: StoreKind) {
    let h = harness(kind, true).await;

    // clock never moves: every event shares one created_at
    let steps = ["available", "responding", "on-scene", "transporting", "available-again"];
    for step in steps {
        h.store.add_event(staffing(step, 3)).await.unwrap();
    }

    h.engine.processor().run_pass(Trigger::Manual).await.unwrap();

    let delivered: Vec<_> = h
        .api
        .delivered()
        .into_iter()
        .map(|p| match p {
            EventPayload::PersonnelStaffing(p) => p.user_id,
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert_eq!(delivered, steps);
}

#[tokio::test]
async fn sqlite_restart_loses_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let (in_flight, waiting) = {
        let store = SqliteQueueStore::open(&path).await.unwrap();
        let in_flight = store.add_event(staffing("user-1", 3)).await.unwrap();
        let waiting = store.add_event(staffing("user-2", 3)).await.unwrap();

        // crash mid-delivery
        store.try_acquire_processing().await.unwrap();
        store
            .update_event_status(in_flight, StatusTransition::Processing)
            .await
            .unwrap();
        store.close().await;
        (in_flight, waiting)
    };

    let store: Arc<dyn QueueStore> = Arc::new(SqliteQueueStore::open(&path).await.unwrap());
    let pending: Vec<_> = store
        .get_pending_events()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(pending.len(), 2);
    assert!(pending.contains(&in_flight) && pending.contains(&waiting));

    let h = harness_with(store, ScriptedDomainApi::new(), true, clock());
    let report = h.engine.processor().run_pass(Trigger::Startup).await.unwrap();
    assert!(matches!(report.outcome, PassOutcome::Ran { completed: 2, .. }));
}

#[tokio::test]
async fn memory_snapshot_restart_loses_nothing() {
    let clock = clock();
    let store = InMemoryQueueStore::with_clock(clock.clone());
    let in_flight = store.add_event(staffing("user-1", 3)).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    let requeued = store.add_event(staffing("user-2", 3)).await.unwrap();

    store
        .update_event_status(requeued, StatusTransition::Processing)
        .await
        .unwrap();
    store
        .update_event_status(requeued, StatusTransition::Requeued { error: "timeout".into() })
        .await
        .unwrap();
    store.try_acquire_processing().await.unwrap();
    store
        .update_event_status(in_flight, StatusTransition::Processing)
        .await
        .unwrap();

    let restarted = InMemoryQueueStore::from_snapshot(store.durable_snapshot().await, clock.clone());
    let pending = restarted.get_pending_events().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, in_flight);
    assert_eq!(pending[0].status, EventStatus::Pending);
    assert_eq!(pending[1].retry_count, 1);

    let h = harness_with(Arc::new(restarted), ScriptedDomainApi::new(), true, clock);
    let report = h.engine.processor().run_pass(Trigger::Startup).await.unwrap();
    assert!(matches!(report.outcome, PassOutcome::Ran { completed: 2, .. }));
}
