//! Domain identifiers (strongly-typed IDs).
//!
//! IDs are ULID-backed and wrapped in `Id<T>`, where `T` is a zero-sized
//! marker. The marker costs nothing at runtime but keeps unrelated IDs from
//! being mixed up at compile time.
//!
//! ULID を使う理由:
//! - 時刻でソート可能（生成順 = 投入順の目安になる）
//! - 調整なしで生成できる（カウンタ共有が不要）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each ID kind.
pub trait IdMarker: Send + Sync + 'static {
    /// Prefix used by `Display` (e.g. `"action-"`).
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
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

    /// Fresh ID from the system clock and thread-local randomness.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
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

/// Marker for queued actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {}

impl IdMarker for Action {
    fn prefix() -> &'static str {
        "action-"
    }
}

/// Identifier of a Queued Action (submission and result-retrieval key).
pub type ActionId = Id<Action>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_action_prefix() {
        let ulid = Ulid::new();
        let id = ActionId::from_ulid(ulid);

        assert_eq!(id.as_ulid(), ulid);
        assert_eq!(id.to_string(), format!("action-{ulid}"));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ActionId::generate();
        let b = ActionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = ActionId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2)); // 時刻が進むのを待つ
        let id2 = ActionId::generate();

        assert!(id1 < id2);
    }

    #[test]
    fn ids_survive_json() {
        let id = ActionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: ActionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<ActionId>(), std::mem::size_of::<Ulid>());
    }
}
