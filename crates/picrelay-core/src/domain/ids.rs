//! Domain identifiers.
//!
//! ULID を使う理由:
//! - 生成順でソートできる（ログを時系列で追いやすい）
//! - 調整なしで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifies one delivery item across its whole lifetime (primary queue,
/// retry queue, terminal log line).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Ulid);

impl ItemId {
    /// Generate a fresh id from the current time.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for ItemId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = ItemId::generate();
        let b = ItemId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_has_item_prefix() {
        let ulid = Ulid::new();
        let id = ItemId::from(ulid);
        assert_eq!(id.to_string(), format!("item-{ulid}"));
        assert_eq!(id.as_ulid(), ulid);
    }
}
