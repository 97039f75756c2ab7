//! ScriptedDomainApi - in-process `DomainApi` with programmable failures.
//!
//! Each operation pops its next scripted result; with nothing scripted it
//! succeeds. Calls are recorded in order, payloads included, so tests can
//! check both routing and replay order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    DeliveryError, EventPayload, EventType, PersonnelStaffingPayload, PersonnelStatusPayload,
    UnitStatusPayload,
};
use crate::ports::DomainApi;

#[derive(Default)]
struct Script {
    queued: HashMap<EventType, VecDeque<Result<(), DeliveryError>>>,
    always: HashMap<EventType, DeliveryError>,
    delivered: Vec<EventPayload>,
    calls: Vec<EventType>,
}

#[derive(Default)]
pub struct ScriptedDomainApi {
    script: Mutex<Script>,
    latency: Option<Duration>,
}

impl ScriptedDomainApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The next call for `event_type` fails with `error`.
    pub fn fail_next(&self, event_type: EventType, error: DeliveryError) {
        self.lock()
            .queued
            .entry(event_type)
            .or_default()
            .push_back(Err(error));
    }

    /// Every call for `event_type` fails until `recover` is called.
    pub fn fail_always(&self, event_type: EventType, error: DeliveryError) {
        self.lock().always.insert(event_type, error);
    }

    pub fn recover(&self, event_type: EventType) {
        let mut script = self.lock();
        script.always.remove(&event_type);
        script.queued.remove(&event_type);
    }

    /// Operation types in call order, failed calls included.
    pub fn calls(&self) -> Vec<EventType> {
        self.lock().calls.clone()
    }

    /// Payloads that were accepted, in order.
    pub fn delivered(&self) -> Vec<EventPayload> {
        self.lock().delivered.clone()
    }

    async fn answer(&self, payload: EventPayload) -> Result<(), DeliveryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let event_type = payload.event_type();
        let mut script = self.lock();
        script.calls.push(event_type);

        let result = match script.always.get(&event_type) {
            Some(error) => Err(error.clone()),
            None => script
                .queued
                .get_mut(&event_type)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(())),
        };
        if result.is_ok() {
            script.delivered.push(payload);
        }
        result
    }
}

#[async_trait]
impl DomainApi for ScriptedDomainApi {
    async fn save_personnel_status(
        &self,
        payload: &PersonnelStatusPayload,
    ) -> Result<(), DeliveryError> {
        self.answer(payload.clone().into()).await
    }

    async fn save_unit_status(&self, payload: &UnitStatusPayload) -> Result<(), DeliveryError> {
        self.answer(payload.clone().into()).await
    }

    async fn save_personnel_staffing(
        &self,
        payload: &PersonnelStaffingPayload,
    ) -> Result<(), DeliveryError> {
        self.answer(payload.clone().into()).await
    }
}
