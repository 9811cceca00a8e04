use serde::{Deserialize, Serialize};
use std::fmt;

/// First id of the client-local range. Ids at or above this value are never
/// sent over the network.
pub const CLIENT_ID_BASE: u32 = 2_000_000_000;

/// A simulation tick. Entities are conceptually created between tick 0 and 1.
pub type Tick = u64;

/// Unique identifier for an entity within a session.
///
/// Server-authoritative ids live below [`CLIENT_ID_BASE`]; ids at or above it
/// are assigned locally for entities the client creates on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Whether this id belongs to the client-local range.
    pub const fn is_client_side(self) -> bool {
        self.0 >= CLIENT_ID_BASE
    }

    /// Zero is reserved and never names a live entity.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_client_side() {
            write!(f, "c{}", self.0 - CLIENT_ID_BASE)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Stable per-entity identifier of a replicated component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_range_is_disjoint() {
        assert!(!EntityId::new(1).is_client_side());
        assert!(!EntityId::new(CLIENT_ID_BASE - 1).is_client_side());
        assert!(EntityId::new(CLIENT_ID_BASE).is_client_side());
    }

    #[test]
    fn zero_is_invalid() {
        assert!(!EntityId::new(0).is_valid());
        assert!(EntityId::new(7).is_valid());
    }

    #[test]
    fn display_marks_client_ids() {
        assert_eq!(EntityId::new(12).to_string(), "12");
        assert_eq!(EntityId::new(CLIENT_ID_BASE + 3).to_string(), "c3");
        assert_eq!(NetId(5).to_string(), "#5");
    }
}
