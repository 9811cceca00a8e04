use glam::Vec2;
use serde::{Deserialize, Serialize};

use replica_common::{Box2, EntityId, NetId, Tick};
use replica_ecs::components::{Meta, Transform, net_ids};
use replica_ecs::{
    Component, ComponentError, ComponentFactory, ComponentRef, ComponentStage, ComponentState,
    ComponentTable, EntityPrototype, FactoryError, TableError,
};
use replica_spatial::DynamicTree;

use crate::config::WorldConfig;
use crate::entity::{EntityRecord, EntityStore, LifecycleState};

/// Failures of world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("entity id {0} is reserved")]
    InvalidId(EntityId),
    #[error("entity {0} already exists")]
    IdInUse(EntityId),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("cannot {operation} entity {id} while {state}")]
    InvalidTransition {
        id: EntityId,
        state: LifecycleState,
        operation: &'static str,
    },
    #[error("entity {id}: {source}")]
    Factory {
        id: EntityId,
        #[source]
        source: FactoryError,
    },
    #[error("entity {id} must keep its {component} component")]
    RequiredComponent {
        id: EntityId,
        component: &'static str,
    },
    #[error("entity {id} has no component with net id {net_id}")]
    MissingComponent { id: EntityId, net_id: NetId },
    #[error("component {component} on entity {id} failed: {source}")]
    Component {
        id: EntityId,
        component: &'static str,
        #[source]
        source: ComponentError,
    },
    #[error(transparent)]
    Table(TableError),
    #[error("failed to create entity {id} from prototype {prototype:?}: {source}")]
    EntityCreation {
        id: EntityId,
        prototype: String,
        #[source]
        source: Box<WorldError>,
    },
}

impl WorldError {
    /// Name of the component at fault, if the failure came from one.
    pub fn component(&self) -> Option<&'static str> {
        match self {
            WorldError::Component { component, .. } => Some(*component),
            WorldError::EntityCreation { source, .. } => source.component(),
            _ => None,
        }
    }
}

impl From<TableError> for WorldError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Hook {
                entity,
                component,
                source,
            } => WorldError::Component {
                id: entity,
                component,
                source,
            },
            other => WorldError::Table(other),
        }
    }
}

/// An event record produced by every mutation to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    Allocated { id: EntityId, prototype: String },
    Initialized { id: EntityId },
    Started { id: EntityId },
    Deleted { id: EntityId },
    ComponentAdded { id: EntityId, component: String },
    ComponentRemoved { id: EntityId, component: String },
    /// Replicated state was handed to a component.
    StateApplied { id: EntityId, net_id: NetId },
    Stepped { tick: Tick },
}

/// Entities, their components and the spatial index over their bounds.
///
/// The three structures are only mutated together through the operations
/// below, which keeps the index in step with the store.
#[derive(Debug)]
pub struct World {
    entities: EntityStore,
    components: ComponentTable,
    tree: DynamicTree<EntityId>,
    config: WorldConfig,
    tick: Tick,
    /// Append-only log of mutations, drained by consumers.
    event_log: Vec<WorldEvent>,
}

impl Default for World {
    fn default() -> Self {
        Self::with_config(WorldConfig::default())
    }
}

impl World {
    /// Create an empty world at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WorldConfig) -> Self {
        let growth = config.tree_growth;
        let tree = DynamicTree::with_capacity(config.tree_capacity, config.aabb_margin, move |cap| {
            growth.grow(cap)
        });
        Self {
            entities: EntityStore::new(),
            components: ComponentTable::new(),
            tree,
            config,
            tick: 0,
            event_log: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Current simulation tick.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Set the tick directly, e.g. to follow the authority's clock.
    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    /// Advance the simulation by one tick and return the new tick.
    pub fn step(&mut self) -> Tick {
        self.tick += 1;
        self.event_log.push(WorldEvent::Stepped { tick: self.tick });
        self.tick
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(id)
    }

    pub fn state(&self, id: EntityId) -> Option<LifecycleState> {
        self.entities.state(id)
    }

    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    pub fn tree(&self) -> &DynamicTree<EntityId> {
        &self.tree
    }

    pub fn component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.components.try_get::<T>(id)
    }

    /// Mutable access to a component. Call [`update_entity_tree`](Self::update_entity_tree)
    /// afterwards if the change moves the entity.
    pub fn component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.components.try_get_mut::<T>(id)
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Allocate an entity under a fresh client-local id.
    pub fn allocate_entity(
        &mut self,
        prototype: &EntityPrototype,
        factory: &ComponentFactory,
    ) -> Result<EntityId, WorldError> {
        let id = self.entities.generate_client_id();
        self.allocate_entity_with_id(id, prototype, factory)
    }

    /// Allocate an entity under `id` and build its components from the
    /// prototype. Every entity receives a `Meta` and a `Transform`.
    ///
    /// On failure the partially built entity is torn down and no trace of it
    /// remains, not even in the event log.
    pub fn allocate_entity_with_id(
        &mut self,
        id: EntityId,
        prototype: &EntityPrototype,
        factory: &ComponentFactory,
    ) -> Result<EntityId, WorldError> {
        if !id.is_valid() {
            return Err(WorldError::InvalidId(id));
        }
        if !self.entities.insert(id, prototype.id.as_str(), self.tick) {
            return Err(WorldError::IdInUse(id));
        }
        let mark = self.event_log.len();
        self.event_log.push(WorldEvent::Allocated {
            id,
            prototype: prototype.id.clone(),
        });

        if let Err(source) = self.build_components(id, prototype, factory) {
            self.components.remove_entity(id);
            self.entities.remove(id);
            self.event_log.truncate(mark);
            return Err(WorldError::EntityCreation {
                id,
                prototype: prototype.id.clone(),
                source: Box::new(source),
            });
        }
        let base = self
            .components
            .slots(id)
            .iter()
            .map(|slot| slot.name().to_string())
            .collect();
        self.entities.set_base_components(id, base);
        tracing::debug!(%id, prototype = %prototype.id, "entity allocated");
        Ok(id)
    }

    fn build_components(
        &mut self,
        id: EntityId,
        prototype: &EntityPrototype,
        factory: &ComponentFactory,
    ) -> Result<(), WorldError> {
        let meta = Meta::new(prototype.id.clone(), prototype.display_name());
        self.insert_component(id, Box::new(meta))?;

        for entry in &prototype.components {
            // A repeated entry (or an explicit Meta) configures the existing instance.
            if let Some(existing) = self.components.try_get_dyn_mut(id, entry.kind.as_str()) {
                let component = existing.name();
                existing
                    .expose_data(&entry.data)
                    .map_err(|source| WorldError::Component {
                        id,
                        component,
                        source,
                    })?;
                continue;
            }
            let mut instance = factory
                .create(&entry.kind)
                .map_err(|source| WorldError::Factory { id, source })?;
            let component = instance.name();
            instance
                .expose_data(&entry.data)
                .map_err(|source| WorldError::Component {
                    id,
                    component,
                    source,
                })?;
            self.insert_component(id, instance)?;
        }

        if !self.components.has_type::<Transform>(id) {
            self.insert_component(id, Box::new(Transform::default()))?;
        }
        Ok(())
    }

    fn insert_component(
        &mut self,
        id: EntityId,
        component: Box<dyn Component>,
    ) -> Result<(), WorldError> {
        let name = component.name();
        self.components.add(id, component, self.tick)?;
        self.event_log.push(WorldEvent::ComponentAdded {
            id,
            component: name.to_string(),
        });
        Ok(())
    }

    fn require_state(
        &self,
        id: EntityId,
        expected: LifecycleState,
        operation: &'static str,
    ) -> Result<(), WorldError> {
        let state = self
            .entities
            .state(id)
            .ok_or(WorldError::UnknownEntity(id))?;
        if state != expected {
            return Err(WorldError::InvalidTransition {
                id,
                state,
                operation,
            });
        }
        Ok(())
    }

    /// Run every component's initialize hook. Only valid on a freshly
    /// allocated entity; a failed entity stays `Initializing`.
    pub fn initialize_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.require_state(id, LifecycleState::Allocated, "initialize")?;
        self.entities.set_state(id, LifecycleState::Initializing);
        self.components.initialize_components(id)?;
        self.entities.set_state(id, LifecycleState::Initialized);
        self.event_log.push(WorldEvent::Initialized { id });
        tracing::debug!(%id, "entity initialized");
        Ok(())
    }

    /// Start every component. Only valid on an initialized entity.
    pub fn start_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.require_state(id, LifecycleState::Initialized, "start")?;
        self.components.start_components(id)?;
        self.entities.set_state(id, LifecycleState::Running);
        self.event_log.push(WorldEvent::Started { id });
        tracing::debug!(%id, "entity started");
        Ok(())
    }

    /// Tear down every component, drop the entity from the index and the
    /// store. Returns `false` if there was nothing to delete.
    pub fn delete_entity(&mut self, id: EntityId) -> bool {
        if !self.entities.contains(id) {
            return false;
        }
        self.entities.set_state(id, LifecycleState::Deleted);
        let removed = self.components.remove_entity(id);
        self.tree.remove(&id);
        self.entities.remove(id);
        self.event_log.push(WorldEvent::Deleted { id });
        tracing::debug!(%id, components = removed.len(), "entity deleted");
        true
    }

    /// Allocate, initialize and start a client-local entity at `position`,
    /// then index it. If any step fails the entity is deleted.
    pub fn spawn_entity(
        &mut self,
        prototype: &EntityPrototype,
        position: Vec2,
        factory: &ComponentFactory,
    ) -> Result<EntityId, WorldError> {
        let id = self.allocate_entity(prototype, factory)?;
        if let Some(transform) = self.components.try_get_mut::<Transform>(id) {
            transform.position = position;
        }
        if let Err(source) = self
            .initialize_entity(id)
            .and_then(|()| self.start_entity(id))
        {
            self.delete_entity(id);
            return Err(WorldError::EntityCreation {
                id,
                prototype: prototype.id.clone(),
                source: Box::new(source),
            });
        }
        self.update_entity_tree(id);
        Ok(id)
    }

    /// Attach a component and bring it to the entity's lifecycle stage.
    /// If a lifecycle hook fails the component is removed again.
    pub fn add_component(
        &mut self,
        id: EntityId,
        component: Box<dyn Component>,
    ) -> Result<(), WorldError> {
        let state = self
            .entities
            .state(id)
            .ok_or(WorldError::UnknownEntity(id))?;
        if state == LifecycleState::Deleted {
            return Err(WorldError::InvalidTransition {
                id,
                state,
                operation: "add a component to",
            });
        }
        let name = component.name();
        self.insert_component(id, component)?;

        let target = match state {
            LifecycleState::Initializing | LifecycleState::Initialized => {
                Some(ComponentStage::Initialized)
            }
            LifecycleState::Running => Some(ComponentStage::Running),
            LifecycleState::Allocated | LifecycleState::Deleted => None,
        };
        if let Some(target) = target {
            if let Err(err) = self.components.advance_component(id, name, target) {
                self.detach_component(id, name.into());
                return Err(err.into());
            }
        }
        self.update_entity_tree(id);
        Ok(())
    }

    /// Detach a component after its teardown hook. Returns `Ok(false)` if
    /// absent. Meta and Transform stay for the entity's whole life.
    pub fn remove_component<'k>(
        &mut self,
        id: EntityId,
        key: impl Into<ComponentRef<'k>>,
    ) -> Result<bool, WorldError> {
        let key = key.into();
        if let Some(slot) = self.components.try_slot(id, key) {
            if matches!(slot.net_id(), Some(net_ids::META | net_ids::TRANSFORM)) {
                return Err(WorldError::RequiredComponent {
                    id,
                    component: slot.name(),
                });
            }
        }
        Ok(self.detach_component(id, key))
    }

    fn detach_component(&mut self, id: EntityId, key: ComponentRef<'_>) -> bool {
        let Some(component) = self.components.remove(id, key) else {
            return false;
        };
        self.event_log.push(WorldEvent::ComponentRemoved {
            id,
            component: component.name().to_string(),
        });
        self.update_entity_tree(id);
        true
    }

    /// Hand a current/next state pair to the component owning `net_id`.
    pub fn apply_state(
        &mut self,
        id: EntityId,
        net_id: NetId,
        current: Option<&ComponentState>,
        next: Option<&ComponentState>,
    ) -> Result<(), WorldError> {
        if !self.entities.contains(id) {
            return Err(WorldError::UnknownEntity(id));
        }
        let slot = self
            .components
            .try_slot_mut(id, net_id)
            .ok_or(WorldError::MissingComponent { id, net_id })?;
        let component = slot.name();
        slot.component_mut()
            .handle_state(current, next)
            .map_err(|source| WorldError::Component {
                id,
                component,
                source,
            })?;
        self.components.touch(id, net_id, self.tick);
        self.event_log.push(WorldEvent::StateApplied { id, net_id });
        Ok(())
    }

    /// Mark a component as modified at the current tick so the next capture
    /// picks it up. Returns `false` if absent.
    pub fn dirty_component(&mut self, id: EntityId, net_id: NetId) -> bool {
        self.components.touch(id, net_id, self.tick)
    }

    /// Tight bounds of an entity: the union of its components' local bounds
    /// moved to the transform position, or a zero-sized box at the position.
    pub fn entity_bounds(&self, id: EntityId) -> Option<Box2> {
        if !self.entities.contains(id) {
            return None;
        }
        let position = self
            .components
            .try_get::<Transform>(id)
            .map_or(Vec2::ZERO, |t| t.position);
        let local = self
            .components
            .slots(id)
            .into_iter()
            .filter_map(|slot| slot.component().local_bounds())
            .reduce(|a, b| a.union(&b));
        Some(local.map_or(Box2::point(position), |b| b.translated(position)))
    }

    /// Refresh the entity's entry in the spatial index, inserting it if
    /// missing. Entities that are not yet initialized are left out.
    /// Returns `true` if the tree changed structurally.
    pub fn update_entity_tree(&mut self, id: EntityId) -> bool {
        match self.entities.state(id) {
            Some(LifecycleState::Initialized | LifecycleState::Running) => {}
            _ => return false,
        }
        let Some(bounds) = self.entity_bounds(id) else {
            return false;
        };
        if self.tree.contains(&id) {
            self.tree.update(&id, bounds)
        } else {
            self.tree.add(id, bounds)
        }
    }

    /// Entities whose bounds contain `point`.
    pub fn query_point(&self, point: Vec2) -> impl Iterator<Item = EntityId> + '_ {
        self.tree.query_point(point)
    }

    /// Entities whose bounds intersect `region`.
    pub fn query_box(&self, region: Box2) -> impl Iterator<Item = EntityId> + '_ {
        self.tree.query_box(region)
    }
}
