//! IdGenerator port - ID 生成の抽象化
//!
//! 生成した ID はキューの並び順の tiebreak にも使われるため、同じ生成器から
//! 出た ID は常に単調増加します。
//!
//! # 実装
//! - **UlidGenerator**: 単調増加 ULID（`ulid::Generator`）

use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use tracing::warn;
use ulid::{Generator, Ulid};

use crate::domain::ids::{EventId, PassId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_event_id(&self) -> EventId;

    fn generate_pass_id(&self) -> PassId;
}

/// UlidGenerator は Clock ベースの単調増加 ULID 生成器
///
/// # 単調性
/// - 同じミリ秒内（FixedClock で時刻を止めた場合も含む）では直前の ID を
///   インクリメントするので、生成順 = ソート順
/// - 時計が巻き戻っても直前の ID より小さい ID は返さない
///   （その間は timestamp 部が直前の値に留まる）
pub struct UlidGenerator<C> {
    clock: C,
    generator: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            generator: Mutex::new(Generator::new()),
        }
    }

    fn next_ulid(&self) -> Ulid {
        let now = self.clock.now();
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match generator.generate_from_datetime(SystemTime::from(now)) {
            Ok(ulid) => ulid,
            Err(err) => {
                // 80-bit の乱数部を同一ミリ秒で使い切った場合のみ
                warn!(error = %err, "monotonic ulid overflow; falling back to random");
                Ulid::from_parts(now.timestamp_millis() as u64, rand::random())
            }
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_event_id(&self) -> EventId {
        EventId::from(self.next_ulid())
    }

    fn generate_pass_id(&self) -> PassId {
        PassId::from(self.next_ulid())
    }
}
