use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use replica_common::{CLIENT_ID_BASE, EntityId, Tick};

/// Where an entity is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Allocated,
    Initializing,
    Initialized,
    Running,
    Deleted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Allocated => "allocated",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Running => "running",
            LifecycleState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Per-entity bookkeeping held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub state: LifecycleState,
    pub prototype: String,
    pub created: Tick,
    /// Components present once allocation finished; anything added later
    /// has to be announced to peers explicitly.
    #[serde(default)]
    pub base_components: Vec<String>,
}

/// Entity records keyed by id.
///
/// BTreeMap keeps iteration order deterministic. Client-local ids are handed
/// out sequentially and never reused while the store lives.
#[derive(Debug, Clone)]
pub struct EntityStore {
    records: BTreeMap<EntityId, EntityRecord>,
    next_client_id: u32,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_client_id: CLIENT_ID_BASE + 1,
        }
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    pub fn state(&self, id: EntityId) -> Option<LifecycleState> {
        self.records.get(&id).map(|record| record.state)
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.keys().copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    /// Next unused client-local id. Ids already present (e.g. inserted
    /// explicitly) are skipped.
    pub fn generate_client_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::new(self.next_client_id);
            self.next_client_id = self.next_client_id.wrapping_add(1).max(CLIENT_ID_BASE + 1);
            if !self.records.contains_key(&id) {
                return id;
            }
        }
    }

    /// Insert a fresh `Allocated` record. Returns `false` if the id is taken.
    pub fn insert(&mut self, id: EntityId, prototype: impl Into<String>, tick: Tick) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(
            id,
            EntityRecord {
                id,
                state: LifecycleState::Allocated,
                prototype: prototype.into(),
                created: tick,
                base_components: Vec::new(),
            },
        );
        true
    }

    pub(crate) fn set_state(&mut self, id: EntityId, state: LifecycleState) {
        if let Some(record) = self.records.get_mut(&id) {
            record.state = state;
        }
    }

    pub(crate) fn set_base_components(&mut self, id: EntityId, names: Vec<String>) {
        if let Some(record) = self.records.get_mut(&id) {
            record.base_components = names;
        }
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.records.remove(&id)
    }
}
