//! EngineBuilder - 協調者のワイヤリングとエンジンの構築
//!
//! # Fail-fast 設計
//! - `build()` で必須の協調者がすべて揃っているかをチェックし、
//!   最初に欠けているものを `BuildError` で返す
//! - `max_retries = 0` の設定も起動時に弾く
//!
//! # 任意の協調者のデフォルト
//! - clock: `SystemClock`
//! - sink: `TracingEventSink`
//! - decider: `DefaultDecider`
//! - location: なし（イベントには呼び出し側が渡した GPS だけが載る）

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::config::QueueConfig;
use super::event_manager::EventManager;
use super::processor::{PassReport, QueueProcessor};
use super::status::QueueStatus;
use super::triggers::TriggerSubscriptions;
use crate::domain::{Decider, DefaultDecider, EventId, StoreError, Trigger};
use crate::impls::{Dispatcher, TracingEventSink};
use crate::ports::{
    BackgroundExecutor, Clock, DomainApi, EventSink, LifecycleSignal, LocationProvider,
    QueueStore, ReachabilitySource, SystemClock, UlidGenerator,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

#[derive(Default)]
pub struct EngineBuilder {
    config: QueueConfig,
    store: Option<Arc<dyn QueueStore>>,
    api: Option<Arc<dyn DomainApi>>,
    reachability: Option<Arc<dyn ReachabilitySource>>,
    lifecycle: Option<Arc<dyn LifecycleSignal>>,
    background: Option<Arc<dyn BackgroundExecutor>>,
    location: Option<Arc<dyn LocationProvider>>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    decider: Option<Arc<dyn Decider>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn api(mut self, api: Arc<dyn DomainApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn reachability(mut self, source: Arc<dyn ReachabilitySource>) -> Self {
        self.reachability = Some(source);
        self
    }

    pub fn lifecycle(mut self, lifecycle: Arc<dyn LifecycleSignal>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn background(mut self, background: Arc<dyn BackgroundExecutor>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn build(self) -> Result<Engine, BuildError> {
        if self.config.max_retries == 0 {
            return Err(BuildError::InvalidConfig("max_retries must be at least 1"));
        }
        let store = self.store.ok_or(BuildError::MissingCollaborator("store"))?;
        let api = self.api.ok_or(BuildError::MissingCollaborator("api"))?;
        let reachability = self
            .reachability
            .ok_or(BuildError::MissingCollaborator("reachability"))?;
        let lifecycle = self
            .lifecycle
            .ok_or(BuildError::MissingCollaborator("lifecycle"))?;
        let background = self
            .background
            .ok_or(BuildError::MissingCollaborator("background"))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingEventSink));
        let decider = self.decider.unwrap_or_else(|| Arc::new(DefaultDecider));
        let dispatcher = Dispatcher::new(api);

        let processor = Arc::new(
            QueueProcessor::new(store.clone(), dispatcher.clone(), reachability)
                .with_decider(decider)
                .with_sink(sink.clone())
                .with_id_generator(Arc::new(UlidGenerator::new(clock.clone())))
                .with_lifecycle(
                    lifecycle,
                    background.clone(),
                    self.config.background_task_label.clone(),
                ),
        );

        let mut manager = EventManager::new(
            store.clone(),
            dispatcher,
            processor.clone(),
            clock,
            sink,
            self.config.max_retries,
        );
        if let Some(location) = self.location {
            manager = manager.with_location(location);
        }

        Ok(Engine {
            config: self.config,
            store,
            processor,
            manager,
            background,
            subscriptions: Mutex::new(None),
        })
    }
}

/// 組み立て済みのキューエンジン
pub struct Engine {
    config: QueueConfig,
    store: Arc<dyn QueueStore>,
    processor: Arc<QueueProcessor>,
    manager: EventManager,
    background: Arc<dyn BackgroundExecutor>,
    subscriptions: Mutex<Option<TriggerSubscriptions>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn manager(&self) -> &EventManager {
        &self.manager
    }

    pub fn processor(&self) -> &Arc<QueueProcessor> {
        &self.processor
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.subscriptions
            .lock()
            .map(|subs| subs.is_some())
            .unwrap_or(false)
    }

    /// トリガーを購読し、OS に定期起床を依頼し、前回の残りを流す。
    /// 2 回目以降の呼び出しは何もしない。
    ///
    /// 定期起床の登録拒否はログに出すだけでエラーにはしない
    /// （前面復帰と接続回復のトリガーでキューは流れる）。
    pub async fn start(&self) {
        {
            let Ok(mut subs) = self.subscriptions.lock() else {
                return;
            };
            if subs.is_some() {
                return;
            }
            *subs = Some(Arc::clone(&self.processor).start());
        }

        let interval = self.config.periodic_wake_interval();
        match self.background.register_periodic(interval).await {
            Ok(()) => info!(interval_secs = interval.as_secs(), "periodic wake registered"),
            Err(err) => warn!(error = %err, "periodic wake unavailable"),
        }

        self.processor.trigger(Trigger::Startup);
    }

    /// すべてのトリガーを解除し、定期起床を取り消す。
    /// 実行中のパスはそのまま最後まで走る。
    pub async fn shutdown(&self) {
        let subs = match self.subscriptions.lock() {
            Ok(mut subs) => subs.take(),
            Err(_) => None,
        };
        let Some(subs) = subs else {
            return;
        };
        subs.unsubscribe_all();
        self.background.unregister_periodic().await;
        info!("queue engine stopped");
    }

    /// 今すぐパスを実行して完了を待つ（「今すぐ再送」）
    pub async fn process_now(&self) -> Option<PassReport> {
        self.processor.run_logged(Trigger::Manual).await
    }

    /// 終端失敗したイベントのオペレータによる再送（続けてパスを起動）
    pub async fn retry_failed(&self, id: EventId) -> Result<(), StoreError> {
        self.store.retry_failed_event(id).await?;
        self.processor.trigger(Trigger::Manual);
        Ok(())
    }

    pub async fn status(&self) -> Result<QueueStatus, StoreError> {
        QueueStatus::collect(self.store.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{
        BackgroundCall, InMemoryQueueStore, ManualLifecycle, ManualReachability,
        RecordingBackgroundExecutor, ScriptedDomainApi,
    };
    use std::time::Duration;

    fn complete_builder(background: Arc<RecordingBackgroundExecutor>) -> EngineBuilder {
        Engine::builder()
            .store(Arc::new(InMemoryQueueStore::new()))
            .api(Arc::new(ScriptedDomainApi::new()))
            .reachability(Arc::new(ManualReachability::new(true)))
            .lifecycle(Arc::new(ManualLifecycle::new()))
            .background(background)
    }

    #[test]
    fn test_build_missing_collaborator() {
        let result = Engine::builder()
            .store(Arc::new(InMemoryQueueStore::new()))
            .reachability(Arc::new(ManualReachability::new(true)))
            .build();
        assert!(matches!(result, Err(BuildError::MissingCollaborator("api"))));
    }

    #[test]
    fn test_build_rejects_zero_retry_budget() {
        let result = complete_builder(Arc::new(RecordingBackgroundExecutor::new()))
            .config(QueueConfig {
                max_retries: 0,
                ..QueueConfig::default()
            })
            .build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_success() {
        let engine = complete_builder(Arc::new(RecordingBackgroundExecutor::new()))
            .config(QueueConfig {
                max_retries: 7,
                ..QueueConfig::default()
            })
            .build()
            .unwrap();
        assert_eq!(engine.config().max_retries, 7);
        assert!(!engine.is_started());
    }

    #[tokio::test]
    async fn test_start_and_shutdown_register_and_unregister() {
        let background = Arc::new(RecordingBackgroundExecutor::new());
        let engine = complete_builder(background.clone()).build().unwrap();

        engine.start().await;
        engine.start().await;
        assert!(engine.is_started());

        engine.shutdown().await;
        assert!(!engine.is_started());

        assert_eq!(
            background.calls(),
            vec![
                BackgroundCall::RegisterPeriodic(Duration::from_secs(900)),
                BackgroundCall::UnregisterPeriodic,
            ]
        );
    }

    #[tokio::test]
    async fn test_start_survives_refused_periodic_wake() {
        let engine = complete_builder(Arc::new(RecordingBackgroundExecutor::unavailable()))
            .build()
            .unwrap();

        engine.start().await;
        assert!(engine.is_started());
        engine.shutdown().await;
    }
}
