use std::any::TypeId;
use std::collections::HashMap;

use replica_common::{EntityId, NetId, Tick};

use crate::component::{Component, ComponentError, ComponentStage};

/// Errors from component table operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("entity {entity} already has a {component} component")]
    DuplicateComponent {
        entity: EntityId,
        component: &'static str,
    },
    #[error("entity {entity} already has a component with net id {net_id} ({existing})")]
    DuplicateNetId {
        entity: EntityId,
        net_id: NetId,
        existing: &'static str,
    },
    #[error("entity {entity} has no component matching {key}")]
    Missing { entity: EntityId, key: String },
    #[error("component {component} on entity {entity} failed: {source}")]
    Hook {
        entity: EntityId,
        component: &'static str,
        #[source]
        source: ComponentError,
    },
}

/// Key used to address a component on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRef<'a> {
    Net(NetId),
    Name(&'a str),
    Type(TypeId),
}

impl ComponentRef<'_> {
    pub fn of<T: Component>() -> Self {
        ComponentRef::Type(TypeId::of::<T>())
    }
}

impl From<NetId> for ComponentRef<'_> {
    fn from(net_id: NetId) -> Self {
        ComponentRef::Net(net_id)
    }
}

impl<'a> From<&'a str> for ComponentRef<'a> {
    fn from(name: &'a str) -> Self {
        ComponentRef::Name(name)
    }
}

impl std::fmt::Display for ComponentRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentRef::Net(net_id) => write!(f, "net id {net_id}"),
            ComponentRef::Name(name) => write!(f, "name {name:?}"),
            ComponentRef::Type(type_id) => write!(f, "type {type_id:?}"),
        }
    }
}

/// A component instance plus the bookkeeping the table keeps for it.
pub struct ComponentSlot {
    component: Box<dyn Component>,
    owner: EntityId,
    stage: ComponentStage,
    created: Tick,
    last_modified: Tick,
    order: u64,
}

impl ComponentSlot {
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    pub fn component_mut(&mut self) -> &mut dyn Component {
        self.component.as_mut()
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn name(&self) -> &'static str {
        self.component.name()
    }

    pub fn net_id(&self) -> Option<NetId> {
        self.component.net_id()
    }

    pub fn stage(&self) -> ComponentStage {
        self.stage
    }

    pub fn created(&self) -> Tick {
        self.created
    }

    pub fn last_modified(&self) -> Tick {
        self.last_modified
    }
}

impl std::fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSlot")
            .field("name", &self.name())
            .field("owner", &self.owner)
            .field("net_id", &self.net_id())
            .field("stage", &self.stage)
            .field("last_modified", &self.last_modified)
            .finish()
    }
}

#[derive(Default)]
struct EntityComponents {
    slots: HashMap<TypeId, ComponentSlot>,
    by_net: HashMap<NetId, TypeId>,
    by_name: HashMap<&'static str, TypeId>,
}

impl EntityComponents {
    fn resolve(&self, key: ComponentRef<'_>) -> Option<TypeId> {
        match key {
            ComponentRef::Net(net_id) => self.by_net.get(&net_id).copied(),
            ComponentRef::Name(name) => self.by_name.get(name).copied(),
            ComponentRef::Type(type_id) => self.slots.contains_key(&type_id).then_some(type_id),
        }
    }

    /// Type ids in the order the components were added.
    fn ordered(&self) -> Vec<TypeId> {
        let mut ids: Vec<(u64, TypeId)> = self
            .slots
            .iter()
            .map(|(type_id, slot)| (slot.order, *type_id))
            .collect();
        ids.sort_unstable_by_key(|(order, _)| *order);
        ids.into_iter().map(|(_, type_id)| type_id).collect()
    }
}

/// Per-entity component storage.
///
/// Every lookup (by type, name or network id) is a pair of hash lookups.
#[derive(Default)]
pub struct ComponentTable {
    entities: HashMap<EntityId, EntityComponents>,
    next_order: u64,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities holding at least one component.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of components on `entity`.
    pub fn count(&self, entity: EntityId) -> usize {
        self.entities.get(&entity).map_or(0, |c| c.slots.len())
    }

    /// Total number of components across all entities.
    pub fn total_count(&self) -> usize {
        self.entities.values().map(|c| c.slots.len()).sum()
    }

    /// Attach `component` to `entity`, stamped with `tick`.
    pub fn add(
        &mut self,
        entity: EntityId,
        component: Box<dyn Component>,
        tick: Tick,
    ) -> Result<(), TableError> {
        let type_id = component.as_ref().as_any().type_id();
        let name = component.name();
        let net_id = component.net_id();
        let entry = self.entities.entry(entity).or_default();

        if entry.slots.contains_key(&type_id) || entry.by_name.contains_key(name) {
            return Err(TableError::DuplicateComponent {
                entity,
                component: name,
            });
        }
        if let Some(net_id) = net_id {
            if let Some(existing) = entry.by_net.get(&net_id) {
                return Err(TableError::DuplicateNetId {
                    entity,
                    net_id,
                    existing: entry.slots[existing].name(),
                });
            }
            entry.by_net.insert(net_id, type_id);
        }
        entry.by_name.insert(name, type_id);
        entry.slots.insert(
            type_id,
            ComponentSlot {
                component,
                owner: entity,
                stage: ComponentStage::Added,
                created: tick,
                last_modified: tick,
                order: self.next_order,
            },
        );
        self.next_order += 1;
        tracing::trace!(%entity, component = name, "component added");
        Ok(())
    }

    /// Detach a component after running its teardown hook.
    pub fn remove<'k>(
        &mut self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Option<Box<dyn Component>> {
        let entry = self.entities.get_mut(&entity)?;
        let type_id = entry.resolve(key.into())?;
        let mut slot = entry.slots.remove(&type_id)?;
        slot.component.shutdown();
        entry.by_name.remove(slot.name());
        if let Some(net_id) = slot.net_id() {
            entry.by_net.remove(&net_id);
        }
        if entry.slots.is_empty() {
            self.entities.remove(&entity);
        }
        tracing::trace!(%entity, component = slot.name(), "component removed");
        Some(slot.component)
    }

    /// Tear down and detach every component of `entity`, newest first.
    /// Returns the names of the removed components.
    pub fn remove_entity(&mut self, entity: EntityId) -> Vec<&'static str> {
        let Some(mut entry) = self.entities.remove(&entity) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(entry.slots.len());
        for type_id in entry.ordered().into_iter().rev() {
            if let Some(mut slot) = entry.slots.remove(&type_id) {
                slot.component.shutdown();
                removed.push(slot.name());
            }
        }
        removed
    }

    pub fn has<'k>(&self, entity: EntityId, key: impl Into<ComponentRef<'k>>) -> bool {
        self.entities
            .get(&entity)
            .and_then(|entry| entry.resolve(key.into()))
            .is_some()
    }

    pub fn has_type<T: Component>(&self, entity: EntityId) -> bool {
        self.has(entity, ComponentRef::of::<T>())
    }

    pub fn try_slot<'k>(
        &self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Option<&ComponentSlot> {
        let entry = self.entities.get(&entity)?;
        let type_id = entry.resolve(key.into())?;
        entry.slots.get(&type_id)
    }

    pub fn try_slot_mut<'k>(
        &mut self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Option<&mut ComponentSlot> {
        let entry = self.entities.get_mut(&entity)?;
        let type_id = entry.resolve(key.into())?;
        entry.slots.get_mut(&type_id)
    }

    pub fn try_get_dyn<'k>(
        &self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Option<&dyn Component> {
        self.try_slot(entity, key).map(ComponentSlot::component)
    }

    pub fn try_get_dyn_mut<'k>(
        &mut self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Option<&mut dyn Component> {
        self.try_slot_mut(entity, key).map(ComponentSlot::component_mut)
    }

    /// Like [`try_get_dyn`](Self::try_get_dyn), but a miss is an error.
    pub fn get_dyn<'k>(
        &self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Result<&dyn Component, TableError> {
        let key = key.into();
        self.try_get_dyn(entity, key).ok_or_else(|| TableError::Missing {
            entity,
            key: key.to_string(),
        })
    }

    pub fn try_get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let component = self.try_get_dyn(entity, ComponentRef::of::<T>())?;
        component.as_any().downcast_ref::<T>()
    }

    pub fn try_get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let component = self.try_get_dyn_mut(entity, ComponentRef::of::<T>())?;
        component.as_any_mut().downcast_mut::<T>()
    }

    pub fn get<T: Component>(&self, entity: EntityId) -> Result<&T, TableError> {
        self.try_get::<T>(entity).ok_or_else(|| TableError::Missing {
            entity,
            key: std::any::type_name::<T>().to_string(),
        })
    }

    /// Slots of `entity` in the order they were added.
    pub fn slots(&self, entity: EntityId) -> Vec<&ComponentSlot> {
        let Some(entry) = self.entities.get(&entity) else {
            return Vec::new();
        };
        entry
            .ordered()
            .into_iter()
            .filter_map(|type_id| entry.slots.get(&type_id))
            .collect()
    }

    /// Replicated slots of `entity`, ordered by network id.
    pub fn networked(&self, entity: EntityId) -> Vec<(NetId, &ComponentSlot)> {
        let Some(entry) = self.entities.get(&entity) else {
            return Vec::new();
        };
        let mut out: Vec<(NetId, &ComponentSlot)> = entry
            .by_net
            .iter()
            .filter_map(|(net_id, type_id)| entry.slots.get(type_id).map(|slot| (*net_id, slot)))
            .collect();
        out.sort_unstable_by_key(|(net_id, _)| *net_id);
        out
    }

    /// Stamp a component as modified at `tick`. Returns `false` if absent.
    pub fn touch<'k>(
        &mut self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
        tick: Tick,
    ) -> bool {
        match self.try_slot_mut(entity, key) {
            Some(slot) => {
                slot.last_modified = tick;
                true
            }
            None => false,
        }
    }

    /// Run `initialize` on every component of `entity` still in the
    /// [`Added`](ComponentStage::Added) stage. Returns how many ran.
    pub fn initialize_components(&mut self, entity: EntityId) -> Result<usize, TableError> {
        self.advance(entity, ComponentStage::Initialized)
    }

    /// Initialize any stragglers, then run `startup` on every component not
    /// yet [`Running`](ComponentStage::Running). Returns how many started.
    pub fn start_components(&mut self, entity: EntityId) -> Result<usize, TableError> {
        self.advance(entity, ComponentStage::Initialized)?;
        self.advance(entity, ComponentStage::Running)
    }

    /// Bring a single component up to `target`.
    pub fn advance_component<'k>(
        &mut self,
        entity: EntityId,
        key: impl Into<ComponentRef<'k>>,
        target: ComponentStage,
    ) -> Result<(), TableError> {
        let key = key.into();
        let slot = self.try_slot_mut(entity, key).ok_or_else(|| TableError::Missing {
            entity,
            key: key.to_string(),
        })?;
        if target >= ComponentStage::Initialized && slot.stage < ComponentStage::Initialized {
            step(entity, slot, ComponentStage::Initialized)?;
        }
        if target >= ComponentStage::Running && slot.stage < ComponentStage::Running {
            step(entity, slot, ComponentStage::Running)?;
        }
        Ok(())
    }

    fn advance(&mut self, entity: EntityId, target: ComponentStage) -> Result<usize, TableError> {
        let Some(entry) = self.entities.get_mut(&entity) else {
            return Ok(0);
        };
        let mut advanced = 0;
        for type_id in entry.ordered() {
            let Some(slot) = entry.slots.get_mut(&type_id) else {
                continue;
            };
            if slot.stage < target {
                step(entity, slot, target)?;
                advanced += 1;
            }
        }
        Ok(advanced)
    }
}

/// Run the hook that moves `slot` into `target`, which must be the next stage.
fn step(entity: EntityId, slot: &mut ComponentSlot, target: ComponentStage) -> Result<(), TableError> {
    let result = match target {
        ComponentStage::Added => Ok(()),
        ComponentStage::Initialized => slot.component.initialize(),
        ComponentStage::Running => slot.component.startup(),
    };
    result.map_err(|source| TableError::Hook {
        entity,
        component: slot.name(),
        source,
    })?;
    slot.stage = target;
    Ok(())
}

impl std::fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTable")
            .field("entities", &self.entities.len())
            .field("components", &self.total_count())
            .finish()
    }
}
