//! Domain - ドメインモデル
//!
//! ID、payload、キューイベントと状態遷移、リトライ判定、エラー、通知。

pub mod decision;
pub mod errors;
pub mod event;
pub mod events;
pub mod ids;
pub mod location;
pub mod payload;
pub mod pii;
pub mod state;

pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{BackgroundError, DeliveryError, EnqueueError, ErrorKind, ProcessError, StoreError};
pub use event::{DEFAULT_MAX_RETRIES, NewEvent, QueuedEvent};
pub use events::{QueueNotification, Trigger};
pub use ids::{EventId, PassId};
pub use location::GpsSnapshot;
pub use payload::{
    EventPayload, EventType, PersonnelStaffingPayload, PersonnelStatusPayload, RoleAssignment,
    UnitStatusPayload,
};
pub use state::{EventStatus, StatusTransition};
