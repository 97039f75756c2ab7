//! LocationProvider port - 端末の最新位置
//!
//! 任意の協調者。呼び出し側が位置を渡さなかったときに、enqueue 時だけ参照します。

use crate::domain::GpsSnapshot;

pub trait LocationProvider: Send + Sync {
    fn current_location(&self) -> Option<GpsSnapshot>;
}
