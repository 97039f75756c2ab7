//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID + Phantom Type
//! すべての ID は ULID を phantom type の `Id<T>` で包んだもの。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 先頭が timestamp。同一ミリ秒内の順序は
//!   `UlidGenerator` の単調増加で保証する
//! - **端末上で生成可能**: サーバとの調整が不要
//!
//! ## Phantom Type パターン
//! `EventId` と `PassId` はコンパイル時に別の型なので混同できない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"evt-", "pass-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` はサイズ 0 のマーカーで、`Id<Event>` と `Id<Pass>` は別の型になります。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// プレフィックス付きの表示形式（`evt-01H...`）と素の ULID の両方を受け付ける
impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

/// Marker for queued events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {}

impl IdMarker for Event {
    fn prefix() -> &'static str {
        "evt-"
    }
}

/// 処理パスのマーカー（ログの相関用。永続化しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {}

impl IdMarker for Pass {
    fn prefix() -> &'static str {
        "pass-"
    }
}

/// キューイベントの ID（enqueue 時に採番）
pub type EventId = Id<Event>;

/// Identifier of one processing pass.
pub type PassId = Id<Pass>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix() {
        let event = EventId::from_ulid(Ulid::new());
        let pass = PassId::from_ulid(Ulid::new());

        assert!(event.to_string().starts_with("evt-"));
        assert!(pass.to_string().starts_with("pass-"));
    }

    #[test]
    fn ids_are_sortable_by_creation() {
        let id1 = EventId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = EventId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn parses_prefixed_and_bare_forms() {
        let ulid = Ulid::new();
        let id = EventId::from_ulid(ulid);

        let prefixed: EventId = id.to_string().parse().unwrap();
        let bare: EventId = ulid.to_string().parse().unwrap();

        assert_eq!(prefixed, id);
        assert_eq!(bare, id);
        assert!("evt-not-a-ulid".parse::<EventId>().is_err());
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id = EventId::from_ulid(ulid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<EventId>(), size_of::<Ulid>());
        assert_eq!(size_of::<PassId>(), 16);
    }
}
