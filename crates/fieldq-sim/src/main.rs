use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, Instant, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fieldq_core::app::{PersonnelStaffingInput, PersonnelStatusInput, UnitStatusInput};
use fieldq_core::domain::{
    DeliveryError, GpsSnapshot, PersonnelStaffingPayload, PersonnelStatusPayload,
    RoleAssignment, UnitStatusPayload,
};
use fieldq_core::impls::{
    ManualLifecycle, ManualReachability, RecordingBackgroundExecutor, SqliteQueueStore,
    StaticLocationProvider,
};
use fieldq_core::ports::{DomainApi, LifecycleEvent, ReachabilitySource};
use fieldq_core::{Engine, QueueConfig, SubmitOutcome};

/// Backend stand-in: unreachable while the network is down, and answers the
/// first `n` reachable calls with a 503.
struct FlakyApi {
    network: Arc<ManualReachability>,
    remaining_failures: AtomicU32,
}

impl FlakyApi {
    fn new(network: Arc<ManualReachability>, n: u32) -> Self {
        Self {
            network,
            remaining_failures: AtomicU32::new(n),
        }
    }

    async fn call(&self, what: &str) -> Result<(), DeliveryError> {
        if !self.network.is_reachable().await {
            return Err(DeliveryError::Transport("network unreachable".into()));
        }

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(DeliveryError::Server {
                status: 503,
                message: format!("intentional failure (left={left})"),
            });
        }

        info!(what, "server accepted");
        Ok(())
    }
}

#[async_trait]
impl DomainApi for FlakyApi {
    async fn save_personnel_status(
        &self,
        payload: &PersonnelStatusPayload,
    ) -> Result<(), DeliveryError> {
        self.call(&format!("personnel status {}", payload.status_type))
            .await
    }

    async fn save_unit_status(&self, payload: &UnitStatusPayload) -> Result<(), DeliveryError> {
        self.call(&format!("unit {} {}", payload.unit_id, payload.status_type))
            .await
    }

    async fn save_personnel_staffing(
        &self,
        payload: &PersonnelStaffingPayload,
    ) -> Result<(), DeliveryError> {
        self.call(&format!("staffing {}", payload.staffing_type))
            .await
    }
}

fn report(what: &str, outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Delivered => info!(what, "delivered immediately"),
        SubmitOutcome::Queued(id) => info!(what, event_id = %id, "queued for later"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fieldq_core=debug")),
        )
        .init();

    // (A) durable store + simulated device signals, starting offline
    let db_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("fieldq-sim.db"));
    let store = Arc::new(SqliteQueueStore::open(&db_path).await?);

    let network = Arc::new(ManualReachability::new(false));
    let lifecycle = Arc::new(ManualLifecycle::new());
    let background = Arc::new(RecordingBackgroundExecutor::new());
    let location = Arc::new(StaticLocationProvider::new(Some(
        GpsSnapshot::new(39.7392, -104.9903)
            .with_accuracy(15.0)
            .with_altitude(1609.0)
            .with_speed(13.4)
            .with_heading(270.0),
    )));

    let engine = Engine::builder()
        .config(QueueConfig::default())
        .store(store.clone())
        .api(Arc::new(FlakyApi::new(network.clone(), 2)))
        .reachability(network.clone())
        .lifecycle(lifecycle.clone())
        .background(background.clone())
        .location(location)
        .build()?;
    engine.start().await;

    // (B) user actions while offline: all of them fall back to the queue
    let manager = engine.manager();
    report(
        "personnel status",
        manager
            .save_personnel_status(PersonnelStatusInput {
                user_id: "user-17".into(),
                status_type: "Responding".into(),
                note: "taking engine 4".into(),
                responding_to: "call-2201".into(),
                event_id: "call-2201".into(),
                gps: None,
            })
            .await?,
    );
    report(
        "unit status",
        manager
            .save_unit_status(UnitStatusInput {
                unit_id: "engine-4".into(),
                status_type: "En Route".into(),
                responding_to: "call-2201".into(),
                roles: vec![RoleAssignment {
                    role_id: "officer".into(),
                    user_id: "user-17".into(),
                }],
                ..Default::default()
            })
            .await?,
    );
    report(
        "staffing",
        manager
            .save_personnel_staffing(PersonnelStaffingInput {
                user_id: "user-17".into(),
                staffing_type: "On Shift".into(),
                note: String::new(),
            })
            .await?,
    );
    info!(status = %serde_json::to_string(&engine.status().await?)?, "offline");

    // (C) connectivity comes back; keep nudging until the queue drains
    network.set_reachable(true);
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = engine.status().await?;
        if status.pending == 0 && !status.processing {
            break;
        }
        if Instant::now() > deadline {
            info!("gave up waiting for the queue to drain");
            break;
        }
        sleep(Duration::from_millis(200)).await;
        engine.process_now().await;
    }

    let status = engine.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    // (D) backgrounding asks the OS for an execution window
    lifecycle.emit(LifecycleEvent::EnteredBackground);
    sleep(Duration::from_millis(100)).await;
    info!(calls = ?background.calls(), "background executor");

    engine.shutdown().await;
    store.close().await;
    Ok(())
}
