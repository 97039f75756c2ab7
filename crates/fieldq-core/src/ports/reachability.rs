//! ReachabilitySource port - ネットワーク到達性
//!
//! - Pull: `is_reachable()`
//! - Push: 遷移のたびに値が変わる `watch` receiver。
//!   リスナーは unreachable -> reachable のエッジにだけ反応する

use async_trait::async_trait;
use tokio::sync::watch;

#[async_trait]
pub trait ReachabilitySource: Send + Sync {
    async fn is_reachable(&self) -> bool;

    fn watch(&self) -> watch::Receiver<bool>;
}
