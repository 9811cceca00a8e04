use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::json;

use replica_common::{Box2, EntityId, NetId};
use replica_ecs::components::{Collidable, Meta, Transform, net_ids};
use replica_ecs::{
    Component, ComponentError, ComponentFactory, ComponentState, EntityPrototype,
    PrototypeRegistry, StatePayload,
};
use replica_kernel::{LifecycleState, World, WorldEvent};
use replica_sync::{
    ComponentChange, EntitySnapshot, ReconcilerConfig, SnapshotReconciler, SyncError,
    TickSnapshotMessage, capture_world,
};

const VOLATILE: NetId = NetId(40);

/// Replicated component that rejects states flagged as poisoned.
#[derive(Default)]
struct Volatile {
    value: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct VolatileState {
    value: i32,
    poisoned: bool,
}

impl StatePayload for VolatileState {
    const NET_ID: NetId = VOLATILE;
}

impl Component for Volatile {
    fn name(&self) -> &'static str {
        "Volatile"
    }

    fn net_id(&self) -> Option<NetId> {
        Some(VOLATILE)
    }

    fn handle_state(
        &mut self,
        current: Option<&ComponentState>,
        _next: Option<&ComponentState>,
    ) -> Result<(), ComponentError> {
        if let Some(state) = current {
            let state: VolatileState = state.decode()?;
            if state.poisoned {
                return Err(ComponentError::hook("Volatile", "poisoned state"));
            }
            self.value = state.value;
        }
        Ok(())
    }
}

/// Local component whose lifecycle hooks fail when configured to.
#[derive(Default)]
struct Brittle {
    fail_init: bool,
    fail_start: bool,
}

impl Component for Brittle {
    fn name(&self) -> &'static str {
        "Brittle"
    }

    fn expose_data(&mut self, data: &serde_json::Value) -> Result<(), ComponentError> {
        self.fail_init = data["fail_init"].as_bool().unwrap_or(false);
        self.fail_start = data["fail_start"].as_bool().unwrap_or(false);
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), ComponentError> {
        if self.fail_init {
            return Err(ComponentError::hook("Brittle", "initialize failed"));
        }
        Ok(())
    }

    fn startup(&mut self) -> Result<(), ComponentError> {
        if self.fail_start {
            return Err(ComponentError::hook("Brittle", "startup failed"));
        }
        Ok(())
    }
}

struct Fixture {
    factory: ComponentFactory,
    prototypes: PrototypeRegistry,
}

impl Fixture {
    fn new() -> Self {
        let mut factory = ComponentFactory::with_builtins();
        factory.register::<Volatile>().unwrap();
        factory.register::<Brittle>().unwrap();

        let mut prototypes = PrototypeRegistry::new();
        prototypes.register(EntityPrototype::new("dot")).unwrap();
        prototypes
            .register(
                EntityPrototype::new("crate")
                    .with_component("Collidable", json!({ "bounds": [-0.5, -0.5, 0.5, 0.5] })),
            )
            .unwrap();
        prototypes
            .register(EntityPrototype::new("volatile").with_component("Volatile", json!(null)))
            .unwrap();
        prototypes
            .register(
                EntityPrototype::new("bad_init")
                    .with_component("Brittle", json!({ "fail_init": true })),
            )
            .unwrap();
        prototypes
            .register(
                EntityPrototype::new("bad_start")
                    .with_component("Brittle", json!({ "fail_start": true })),
            )
            .unwrap();
        Self {
            factory,
            prototypes,
        }
    }

    fn reconciler(&self, config: ReconcilerConfig) -> SnapshotReconciler<'_> {
        SnapshotReconciler::new(&self.factory, &self.prototypes, config)
    }
}

fn meta(prototype: &str) -> ComponentState {
    Meta::new(prototype, prototype).get_state().unwrap().unwrap()
}

fn at(x: f32, y: f32) -> ComponentState {
    Transform::at(Vec2::new(x, y)).get_state().unwrap().unwrap()
}

fn volatile(value: i32, poisoned: bool) -> ComponentState {
    ComponentState::encode(&VolatileState { value, poisoned }).unwrap()
}

fn new_entity(raw: u32, prototype: &str, x: f32) -> EntitySnapshot {
    EntitySnapshot::new(EntityId::new(raw))
        .with_state(meta(prototype))
        .with_state(at(x, 0.0))
}

fn id(raw: u32) -> EntityId {
    EntityId::new(raw)
}

/// A world holding running entities 1..=n of the "crate" prototype at x = raw.
fn populated(fixture: &Fixture, n: u32) -> World {
    let mut world = World::new();
    let current: Vec<_> = (1..=n).map(|raw| new_entity(raw, "crate", raw as f32 * 10.0)).collect();
    fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &current, &[], &[])
        .unwrap();
    world.drain_events();
    world
}

#[test]
fn empty_apply_changes_nothing() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 3);
    let tree_before: Vec<_> = world.tree().items().map(|e| (e, world.tree().fat_box(&e))).collect();

    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[], &[], &[])
        .unwrap();

    assert!(report.is_empty());
    assert!(world.events().is_empty());
    assert_eq!(world.entity_count(), 3);
    assert_eq!(world.components().total_count(), 9);
    for (entity, fat) in tree_before {
        assert_eq!(world.tree().fat_box(&entity), fat);
    }
}

#[test]
fn new_entities_end_up_running_and_indexed() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[new_entity(1, "crate", 0.0), new_entity(2, "dot", 5.0)], &[], &[])
        .unwrap();

    assert_eq!(report.created, vec![id(1), id(2)]);
    for raw in [1, 2] {
        assert_eq!(world.state(id(raw)), Some(LifecycleState::Running));
        assert!(world.tree().contains(&id(raw)));
    }
    assert_eq!(world.query_point(Vec2::new(0.25, 0.25)).collect::<Vec<_>>(), vec![id(1)]);
    assert_eq!(world.query_point(Vec2::new(5.0, 0.0)).collect::<Vec<_>>(), vec![id(2)]);
    assert!(world.tree().validate());
}

#[test]
fn deleting_unknown_ids_is_harmless() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 2);
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[], &[id(99), id(1234)], &[])
        .unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(world.entity_count(), 2);
    assert!(world.events().is_empty());
}

#[test]
fn deletions_remove_entity_from_store_and_index() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 2);
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[], &[id(1)], &[])
        .unwrap();
    assert_eq!(report.deleted, vec![id(1)]);
    assert!(!world.contains(id(1)));
    assert!(!world.tree().contains(&id(1)));
    assert_eq!(world.query_point(Vec2::new(10.0, 0.0)).count(), 0);
    assert!(world.contains(id(2)));
}

#[test]
fn update_touches_only_the_named_entity() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 3);
    let current = [EntitySnapshot::new(id(2)).with_state(at(50.0, 1.0))];
    let next = [EntitySnapshot::new(id(2)).with_state(at(51.0, 1.0))];

    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &current, &[], &next)
        .unwrap();

    assert_eq!(report.updated, 1);
    let transform = world.component::<Transform>(id(2)).unwrap();
    assert_eq!(transform.position, Vec2::new(50.0, 1.0));
    assert_eq!(transform.lerp_destination, Some(Vec2::new(51.0, 1.0)));
    assert!(world.events().iter().all(|event| match event {
        WorldEvent::StateApplied { id: entity, .. } => *entity == id(2),
        _ => true,
    }));
    assert_eq!(world.component::<Transform>(id(1)).unwrap().position, Vec2::new(10.0, 0.0));
    assert_eq!(world.component::<Transform>(id(3)).unwrap().position, Vec2::new(30.0, 0.0));
    assert_eq!(world.query_point(Vec2::new(50.0, 1.0)).collect::<Vec<_>>(), vec![id(2)]);
}

#[test]
fn next_only_entry_for_known_entity_is_applied() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 1);
    let next = [EntitySnapshot::new(id(1)).with_state(at(12.0, 0.0))];
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[], &[], &next)
        .unwrap();
    assert_eq!(report.updated, 1);
    let transform = world.component::<Transform>(id(1)).unwrap();
    assert_eq!(transform.position, Vec2::new(10.0, 0.0));
    assert_eq!(transform.lerp_destination, Some(Vec2::new(12.0, 0.0)));
}

#[test]
fn next_for_unknown_entity_is_dropped() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[], &[], &[new_entity(8, "dot", 0.0)])
        .unwrap();
    assert_eq!(report.dropped_next, 1);
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn state_arrives_before_same_message_deletion() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 1);
    let current = [EntitySnapshot::new(id(1)).with_state(at(3.0, 3.0))];
    fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &current, &[id(1)], &[])
        .unwrap();

    let events = world.drain_events();
    let applied = events
        .iter()
        .position(|e| matches!(e, WorldEvent::StateApplied { id: entity, .. } if *entity == id(1)))
        .unwrap();
    let deleted = events
        .iter()
        .position(|e| *e == WorldEvent::Deleted { id: id(1) })
        .unwrap();
    assert!(applied < deleted);
    assert!(!world.contains(id(1)));
}

#[test]
fn created_and_deleted_in_one_message_never_starts() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[new_entity(4, "dot", 0.0)], &[id(4)], &[])
        .unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.deleted, vec![id(4)]);
    assert!(!world.events().contains(&WorldEvent::Started { id: id(4) }));
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn component_changes_add_and_remove() {
    let fixture = Fixture::new();
    let mut world = World::new();
    fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[new_entity(1, "dot", 0.0)], &[], &[])
        .unwrap();

    let added = EntitySnapshot::new(id(1))
        .with_change(ComponentChange::added(net_ids::COLLIDABLE, "Collidable"))
        .with_state(Collidable::new(Box2::centered(2.0)).get_state().unwrap().unwrap());
    fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[added], &[], &[])
        .unwrap();
    assert_eq!(world.component::<Collidable>(id(1)).unwrap().bounds, Box2::centered(2.0));
    assert_eq!(world.tree().tight_box(&id(1)), Some(Box2::centered(2.0)));

    let removed = EntitySnapshot::new(id(1))
        .with_change(ComponentChange::removed(net_ids::COLLIDABLE, "Collidable"));
    fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[removed], &[], &[])
        .unwrap();
    assert!(world.component::<Collidable>(id(1)).is_none());
    assert_eq!(world.tree().tight_box(&id(1)), Some(Box2::point(Vec2::ZERO)));
}

#[test]
fn required_components_survive_removal_changes() {
    let fixture = Fixture::new();
    let removals = [EntitySnapshot::new(id(1))
        .with_change(ComponentChange::removed(net_ids::TRANSFORM, "Transform"))
        .with_change(ComponentChange::removed(net_ids::META, "Meta"))];

    let mut world = populated(&fixture, 1);
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &removals, &[], &[])
        .unwrap_err();
    assert!(err.is_desync());
    assert!(world.component::<Transform>(id(1)).is_some());
    assert!(world.component::<Meta>(id(1)).is_some());

    let mut world = populated(&fixture, 1);
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &removals, &[], &[])
        .unwrap();
    assert_eq!(report.skipped, 2);
    assert!(report.broken.is_empty());
    assert_eq!(world.state(id(1)), Some(LifecycleState::Running));
    assert_eq!(world.component::<Transform>(id(1)).unwrap().position, Vec2::new(10.0, 0.0));
    assert!(world.component::<Meta>(id(1)).is_some());
    assert!(world.query_point(Vec2::new(10.0, 0.0)).any(|hit| hit == id(1)));
    assert!(world.query_point(Vec2::ZERO).next().is_none());
}

#[test]
fn add_change_for_unregistered_name_breaks_entity() {
    let fixture = Fixture::new();
    let unknown = [EntitySnapshot::new(id(1))
        .with_change(ComponentChange::added(NetId(90), "Phantom"))];

    let mut world = populated(&fixture, 1);
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &unknown, &[], &[])
        .unwrap_err();
    assert!(matches!(err, SyncError::ComponentApply { ref component, .. } if component == "Phantom"));

    let mut world = populated(&fixture, 2);
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &unknown, &[], &[])
        .unwrap();
    assert_eq!(report.broken, vec![id(1)]);
    assert!(!world.contains(id(1)));
    assert!(!world.tree().contains(&id(1)));
    assert!(world.contains(id(2)));
}

#[test]
fn add_change_with_mismatched_net_id_is_skipped() {
    let fixture = Fixture::new();
    let mismatched = [EntitySnapshot::new(id(1))
        .with_change(ComponentChange::added(NetId(77), "Appearance"))];

    let mut world = populated(&fixture, 1);
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &mismatched, &[], &[])
        .unwrap_err();
    assert!(err.is_desync());

    let mut world = populated(&fixture, 1);
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &mismatched, &[], &[])
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert!(report.broken.is_empty());
    assert!(!world.components().has(id(1), "Appearance"));
    assert_eq!(world.state(id(1)), Some(LifecycleState::Running));
}

#[test]
fn removing_untracked_component_is_a_no_op() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 1);
    let removed = EntitySnapshot::new(id(1))
        .with_change(ComponentChange::removed(net_ids::APPEARANCE, "Appearance"));
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[removed], &[], &[])
        .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(world.components().count(id(1)), 3);
}

#[test]
fn untracked_state_aborts_strict_pass() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 1);
    let current = [EntitySnapshot::new(id(1)).with_state(volatile(1, false))];
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &current, &[], &[])
        .unwrap_err();
    assert!(err.is_desync());
    assert_eq!(err.entity(), Some(id(1)));
}

#[test]
fn untracked_state_is_skipped_when_tolerant() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 1);
    let current = [EntitySnapshot::new(id(1))
        .with_state(volatile(1, false))
        .with_state(at(7.0, 7.0))];
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &current, &[], &[])
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert!(report.broken.is_empty());
    assert_eq!(world.state(id(1)), Some(LifecycleState::Running));
    assert_eq!(world.component::<Transform>(id(1)).unwrap().position, Vec2::new(7.0, 7.0));
}

#[test]
fn failing_state_apply_aborts_strict_pass() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let snapshot = new_entity(1, "volatile", 0.0).with_state(volatile(3, true));
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[snapshot], &[], &[])
        .unwrap_err();
    match err {
        SyncError::ComponentApply { entity, component, .. } => {
            assert_eq!(entity, id(1));
            assert_eq!(component, "Volatile");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_state_apply_deletes_entity_when_tolerant() {
    let fixture = Fixture::new();
    let mut world = populated(&fixture, 2);
    let current = [
        new_entity(5, "volatile", 0.0).with_state(volatile(3, true)),
        new_entity(6, "volatile", 1.0).with_state(volatile(4, false)),
        EntitySnapshot::new(id(1)).with_state(at(-10.0, 0.0)),
    ];
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &current, &[], &[])
        .unwrap();

    assert_eq!(report.broken, vec![id(5)]);
    assert_eq!(report.created, vec![id(6)]);
    assert!(!world.contains(id(5)));
    assert!(!world.tree().contains(&id(5)));
    assert_eq!(world.component::<Volatile>(id(6)).unwrap().value, 4);
    assert_eq!(world.component::<Transform>(id(1)).unwrap().position, Vec2::new(-10.0, 0.0));
}

#[test]
fn broken_existing_entity_is_deleted_when_tolerant() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let reconciler = fixture.reconciler(ReconcilerConfig::tolerant());
    reconciler
        .apply(&mut world, &[new_entity(3, "volatile", 0.0)], &[], &[])
        .unwrap();
    assert!(world.contains(id(3)));

    let poisoned = [EntitySnapshot::new(id(3)).with_state(volatile(0, true))];
    let report = reconciler.apply(&mut world, &poisoned, &[], &[]).unwrap();
    assert_eq!(report.broken, vec![id(3)]);
    assert_eq!(report.updated, 0);
    assert!(!world.contains(id(3)));
}

#[test]
fn initialization_failure_strict_and_tolerant() {
    let fixture = Fixture::new();

    let mut strict_world = World::new();
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut strict_world, &[new_entity(1, "bad_init", 0.0)], &[], &[])
        .unwrap_err();
    assert!(matches!(err, SyncError::EntityCreation { ref prototype, .. } if prototype == "bad_init"));

    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(
            &mut world,
            &[
                new_entity(1, "bad_init", 0.0),
                new_entity(2, "bad_start", 0.0),
                new_entity(3, "dot", 0.0),
            ],
            &[],
            &[],
        )
        .unwrap();
    assert_eq!(report.broken, vec![id(1), id(2)]);
    assert_eq!(report.created, vec![id(3)]);
    assert_eq!(world.entity_count(), 1);
    assert_eq!(world.tree().items().collect::<Vec<_>>(), vec![id(3)]);
    assert_eq!(world.components().entity_count(), 1);
}

#[test]
fn startup_failure_aborts_strict_pass() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(
            &mut world,
            &[new_entity(1, "dot", 0.0), new_entity(2, "bad_start", 0.0)],
            &[],
            &[],
        )
        .unwrap_err();
    match err {
        SyncError::EntityCreation { entity, prototype, .. } => {
            assert_eq!(entity, id(2));
            assert_eq!(prototype, "bad_start");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(world.state(id(1)), Some(LifecycleState::Running));
    assert_ne!(world.state(id(2)), Some(LifecycleState::Running));
}

#[test]
fn repeated_new_entity_is_created_from_last_entry() {
    let fixture = Fixture::new();

    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(
            &mut world,
            &[new_entity(1, "ghost", 0.0), new_entity(1, "dot", 4.0)],
            &[],
            &[],
        )
        .unwrap();
    assert_eq!(report.created, vec![id(1)]);
    assert!(report.broken.is_empty());
    assert_eq!(world.component::<Meta>(id(1)).unwrap().prototype, "dot");
    assert_eq!(world.component::<Transform>(id(1)).unwrap().position, Vec2::new(4.0, 0.0));

    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(
            &mut world,
            &[new_entity(1, "dot", 4.0), new_entity(1, "ghost", 0.0)],
            &[],
            &[],
        )
        .unwrap();
    assert_eq!(report.broken, vec![id(1)]);
    assert!(report.created.is_empty());
    assert!(!world.contains(id(1)));
}

#[test]
fn unknown_prototype_never_half_creates() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &[new_entity(1, "ghost", 0.0)], &[], &[])
        .unwrap();
    assert_eq!(report.broken, vec![id(1)]);
    assert_eq!(world.entity_count(), 0);
    assert_eq!(world.components().entity_count(), 0);

    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, &[new_entity(1, "ghost", 0.0)], &[], &[])
        .unwrap_err();
    assert!(matches!(err, SyncError::EntityCreation { .. }));
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn missing_meta_state_is_a_desync() {
    let fixture = Fixture::new();
    let mut world = World::new();
    let bare = EntitySnapshot::new(id(1)).with_state(at(0.0, 0.0));

    let err = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply(&mut world, std::slice::from_ref(&bare), &[], &[])
        .unwrap_err();
    assert!(err.is_desync());

    let report = fixture
        .reconciler(ReconcilerConfig::tolerant())
        .apply(&mut world, &[bare], &[], &[])
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn authority_capture_reproduces_world_on_client() {
    let fixture = Fixture::new();
    let mut authority = World::new();
    for (raw, proto, x) in [(1, "crate", 0.0), (2, "dot", 4.0), (3, "volatile", 8.0)] {
        let entity = id(raw);
        authority
            .allocate_entity_with_id(entity, fixture.prototypes.lookup(proto).unwrap(), &fixture.factory)
            .unwrap();
        authority.component_mut::<Transform>(entity).unwrap().position = Vec2::new(x, 1.0);
        authority.initialize_entity(entity).unwrap();
        authority.start_entity(entity).unwrap();
        authority.update_entity_tree(entity);
    }
    authority
        .add_component(id(2), Box::new(Collidable::new(Box2::centered(0.25))))
        .unwrap();
    authority.step();

    let message = TickSnapshotMessage::new(authority.tick(), capture_world(&authority, 0).unwrap());
    let wire = message.to_bytes().unwrap();

    let mut client = World::new();
    let received = TickSnapshotMessage::from_bytes(&wire).unwrap();
    let report = fixture
        .reconciler(ReconcilerConfig::strict())
        .apply_message(&mut client, &received)
        .unwrap();

    assert_eq!(report.created, vec![id(1), id(2), id(3)]);
    for raw in 1..=3 {
        let entity = id(raw);
        assert_eq!(client.state(entity), Some(LifecycleState::Running));
        assert_eq!(
            client.component::<Transform>(entity).unwrap().position,
            authority.component::<Transform>(entity).unwrap().position
        );
        assert_eq!(client.entity_bounds(entity), authority.entity_bounds(entity));
        assert_eq!(client.components().count(entity), authority.components().count(entity));
    }
    assert_eq!(
        client.component::<Meta>(id(1)).unwrap().prototype,
        "crate"
    );
}
