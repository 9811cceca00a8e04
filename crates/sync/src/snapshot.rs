use serde::{Deserialize, Serialize};

use replica_common::{EntityId, NetId, Tick};
use replica_ecs::ComponentState;

use crate::error::SyncError;

/// A component being added to or removed from an entity this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentChange {
    pub net_id: NetId,
    /// Factory name used to instantiate the component on add.
    pub name: String,
    pub deleted: bool,
}

impl ComponentChange {
    pub fn added(net_id: NetId, name: impl Into<String>) -> Self {
        Self {
            net_id,
            name: name.into(),
            deleted: false,
        }
    }

    pub fn removed(net_id: NetId, name: impl Into<String>) -> Self {
        Self {
            net_id,
            name: name.into(),
            deleted: true,
        }
    }
}

/// Replicated view of one entity at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    #[serde(default)]
    pub changes: Vec<ComponentChange>,
    #[serde(default)]
    pub states: Vec<ComponentState>,
}

impl EntitySnapshot {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            changes: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn with_change(mut self, change: ComponentChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_state(mut self, state: ComponentState) -> Self {
        self.states.push(state);
        self
    }

    /// State carried for `net_id`, if any. The last one wins on repeats.
    pub fn state(&self, net_id: NetId) -> Option<&ComponentState> {
        self.states.iter().rev().find(|state| state.net_id == net_id)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.states.is_empty()
    }
}

/// Everything the authority sends for one network tick.
///
/// `next` holds states for the following tick, when known, so clients can
/// interpolate; it is never required for correctness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshotMessage {
    pub tick: Tick,
    pub current: Vec<EntitySnapshot>,
    #[serde(default)]
    pub next: Vec<EntitySnapshot>,
    #[serde(default)]
    pub deletions: Vec<EntityId>,
}

impl TickSnapshotMessage {
    pub fn new(tick: Tick, current: Vec<EntitySnapshot>) -> Self {
        Self {
            tick,
            current,
            ..Self::default()
        }
    }

    pub fn with_next(mut self, next: Vec<EntitySnapshot>) -> Self {
        self.next = next;
        self
    }

    pub fn with_deletions(mut self, deletions: Vec<EntityId>) -> Self {
        self.deletions = deletions;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.next.is_empty() && self.deletions.is_empty()
    }

    /// Encode to CBOR for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| SyncError::Encode(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        ciborium::from_reader(bytes).map_err(|e| SyncError::Decode(e.to_string()))
    }
}
