//! EventSink port - キュー通知の出力先
//!
//! processor はパスの途中から emit するので、実装はブロックしてはいけません。

use crate::domain::QueueNotification;

pub trait EventSink: Send + Sync {
    fn emit(&self, notification: QueueNotification);
}
