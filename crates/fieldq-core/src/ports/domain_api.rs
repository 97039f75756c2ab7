//! DomainApi port - イベントの再送先となるバックエンド操作
//!
//! `EventType` ごとに 1 メソッド。タイムアウトは各呼び出しが持ち、
//! `DeliveryError::Timeout` として返れば他の一時的失敗と同様にリトライされます。

use async_trait::async_trait;

use crate::domain::{
    DeliveryError, PersonnelStaffingPayload, PersonnelStatusPayload, UnitStatusPayload,
};

#[async_trait]
pub trait DomainApi: Send + Sync {
    async fn save_personnel_status(
        &self,
        payload: &PersonnelStatusPayload,
    ) -> Result<(), DeliveryError>;

    async fn save_unit_status(&self, payload: &UnitStatusPayload) -> Result<(), DeliveryError>;

    async fn save_personnel_staffing(
        &self,
        payload: &PersonnelStaffingPayload,
    ) -> Result<(), DeliveryError>;
}
