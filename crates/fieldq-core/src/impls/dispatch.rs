//! Dispatcher - キューの payload を担当するドメイン操作へ振り分ける
//!
//! type → 操作の対応表は下の `match` そのもの。経路のない `EventType` を
//! 追加するとコンパイルエラーになるので、配送時に「未知の type」は起きない。

use std::sync::Arc;

use crate::domain::{DeliveryError, EventPayload};
use crate::ports::DomainApi;

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn DomainApi>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn DomainApi>) -> Self {
        Self { api }
    }

    pub async fn dispatch(&self, payload: &EventPayload) -> Result<(), DeliveryError> {
        match payload {
            EventPayload::PersonnelStatus(p) => self.api.save_personnel_status(p).await,
            EventPayload::UnitStatus(p) => self.api.save_unit_status(p).await,
            EventPayload::PersonnelStaffing(p) => self.api.save_personnel_staffing(p).await,
        }
    }
}
