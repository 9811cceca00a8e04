use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use replica_common::{EntityId, NetId};
use replica_ecs::components::{MetaState, net_ids};
use replica_ecs::{ComponentFactory, ComponentState, PrototypeRegistry};
use replica_kernel::World;

use crate::error::SyncError;
use crate::policy::{FailurePolicy, ReconcilerConfig};
use crate::snapshot::{EntitySnapshot, TickSnapshotMessage};

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Entities created by this pass and now running.
    pub created: Vec<EntityId>,
    /// Already known entities that received changes or states.
    pub updated: usize,
    /// Entities removed through the message's deletions.
    pub deleted: Vec<EntityId>,
    /// Entities that failed under the tolerant policy and were deleted (or
    /// never finished allocating).
    pub broken: Vec<EntityId>,
    /// Desynced keys, and new entities without usable meta state, skipped
    /// under the tolerant policy.
    pub skipped: usize,
    /// `next` entries for entities the client does not know yet.
    pub dropped_next: usize,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One row of the per-pass working set.
struct Pending<'m> {
    id: EntityId,
    current: Option<&'m EntitySnapshot>,
    next: Option<&'m EntitySnapshot>,
    created: bool,
}

/// Applies authority snapshots to a client world.
///
/// Holds only borrowed collaborators and its configuration; all state lives
/// in the [`World`] passed to each call. Not reentrant: one pass at a time
/// on the simulation thread.
pub struct SnapshotReconciler<'a> {
    factory: &'a ComponentFactory,
    prototypes: &'a PrototypeRegistry,
    config: ReconcilerConfig,
}

impl<'a> SnapshotReconciler<'a> {
    pub fn new(
        factory: &'a ComponentFactory,
        prototypes: &'a PrototypeRegistry,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            factory,
            prototypes,
            config,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.config.policy
    }

    pub fn apply_message(
        &self,
        world: &mut World,
        message: &TickSnapshotMessage,
    ) -> Result<ApplyReport, SyncError> {
        self.apply(world, &message.current, &message.deletions, &message.next)
    }

    /// Reconcile `world` with one tick of authority state.
    ///
    /// Known entities are updated, unknown ones created from the prototype
    /// named by their meta state, then `deletions` are processed, and finally
    /// the new entities are initialized, started and indexed.
    pub fn apply(
        &self,
        world: &mut World,
        current: &[EntitySnapshot],
        deletions: &[EntityId],
        next: &[EntitySnapshot],
    ) -> Result<ApplyReport, SyncError> {
        let span = tracing::info_span!(
            "apply_snapshot",
            current = current.len(),
            next = next.len(),
            deletions = deletions.len()
        );
        let _enter = span.enter();

        let mut report = ApplyReport::default();
        let mut work: Vec<Pending<'_>> = Vec::with_capacity(current.len());
        let mut index: HashMap<EntityId, usize> = HashMap::with_capacity(current.len());
        let mut created: Vec<EntityId> = Vec::new();
        let mut broken: BTreeSet<EntityId> = BTreeSet::new();

        for snapshot in current {
            let id = snapshot.id;
            if let Some(&row) = index.get(&id) {
                tracing::warn!(entity = %id, "entity listed twice in current, keeping the last");
                work[row].current = Some(snapshot);
                continue;
            }
            index.insert(id, work.len());
            work.push(Pending {
                id,
                current: Some(snapshot),
                next: None,
                created: false,
            });
        }

        // Creation sees only the surviving entry for each id.
        let mut failed: HashSet<EntityId> = HashSet::new();
        for pending in &mut work {
            let Some(snapshot) = pending.current else {
                continue;
            };
            if world.contains(pending.id) {
                continue;
            }
            match self.create_entity(world, snapshot) {
                Ok(()) => {
                    pending.created = true;
                    created.push(pending.id);
                }
                Err(err) => {
                    let desync = err.is_desync();
                    self.tolerate(err)?;
                    if desync {
                        report.skipped += 1;
                    } else {
                        report.broken.push(pending.id);
                    }
                    failed.insert(pending.id);
                }
            }
        }
        if !failed.is_empty() {
            work.retain(|pending| !failed.contains(&pending.id));
            index = work
                .iter()
                .enumerate()
                .map(|(row, pending)| (pending.id, row))
                .collect();
        }

        for snapshot in next {
            let id = snapshot.id;
            if let Some(&row) = index.get(&id) {
                work[row].next = Some(snapshot);
            } else if world.contains(id) {
                index.insert(id, work.len());
                work.push(Pending {
                    id,
                    current: None,
                    next: Some(snapshot),
                    created: false,
                });
            } else {
                tracing::warn!(entity = %id, "next state for unknown entity dropped");
                report.dropped_next += 1;
            }
        }

        for pending in &work {
            if let Err(err) = self.apply_entity(world, pending, &mut report) {
                self.tolerate(err)?;
                broken.insert(pending.id);
            }
        }
        report.updated = work
            .iter()
            .filter(|pending| !pending.created && !broken.contains(&pending.id))
            .count();

        for pending in &work {
            if !broken.contains(&pending.id) {
                world.update_entity_tree(pending.id);
            }
        }

        for &id in deletions {
            if id.is_client_side() {
                tracing::warn!(entity = %id, "deletion of client-local entity ignored");
            } else if world.delete_entity(id) {
                report.deleted.push(id);
            } else {
                tracing::trace!(entity = %id, "deletion of unknown entity ignored");
            }
        }

        for &id in &created {
            if broken.contains(&id) || !world.contains(id) {
                continue;
            }
            if let Err(err) = world.initialize_entity(id) {
                let prototype = prototype_of(world, id);
                self.tolerate(SyncError::creation(id, prototype, err))?;
                broken.insert(id);
            }
        }

        for &id in &created {
            if broken.contains(&id) || !world.contains(id) {
                continue;
            }
            if let Err(err) = world.start_entity(id) {
                let prototype = prototype_of(world, id);
                self.tolerate(SyncError::creation(id, prototype, err))?;
                broken.insert(id);
            }
        }

        for &id in &created {
            if broken.contains(&id) || !world.contains(id) {
                continue;
            }
            world.update_entity_tree(id);
            report.created.push(id);
        }

        for &id in &broken {
            world.delete_entity(id);
            report.broken.push(id);
        }

        tracing::trace!(
            created = report.created.len(),
            updated = report.updated,
            deleted = report.deleted.len(),
            broken = report.broken.len(),
            skipped = report.skipped,
            "snapshot applied"
        );
        Ok(report)
    }

    /// Allocate a local entity for a snapshot naming an unknown id.
    fn create_entity(&self, world: &mut World, snapshot: &EntitySnapshot) -> Result<(), SyncError> {
        let id = snapshot.id;
        if id.is_client_side() {
            return Err(SyncError::desync(id, "snapshot names an unknown client-local entity"));
        }
        let meta_state = snapshot
            .state(net_ids::META)
            .ok_or_else(|| SyncError::desync(id, "new entity carries no meta state"))?;
        let meta: MetaState = meta_state
            .decode()
            .map_err(|err| SyncError::desync(id, format!("unreadable meta state: {err}")))?;
        let prototype = self
            .prototypes
            .lookup(&meta.prototype)
            .map_err(|err| SyncError::creation(id, meta.prototype.as_str(), err))?;
        world
            .allocate_entity_with_id(id, prototype, self.factory)
            .map_err(|err| SyncError::creation(id, meta.prototype.as_str(), err))?;
        tracing::debug!(entity = %id, prototype = %meta.prototype, "entity created from snapshot");
        Ok(())
    }

    /// Apply component changes from `current`, then every current/next state
    /// pair, keyed by network id.
    fn apply_entity(
        &self,
        world: &mut World,
        pending: &Pending<'_>,
        report: &mut ApplyReport,
    ) -> Result<(), SyncError> {
        let id = pending.id;

        if let Some(current) = pending.current {
            for change in &current.changes {
                if change.deleted {
                    if change.net_id == net_ids::META || change.net_id == net_ids::TRANSFORM {
                        let err = SyncError::desync(
                            id,
                            format!("snapshot removes required component {}", change.name),
                        );
                        self.skip_key(err, report)?;
                        continue;
                    }
                    let removed = world
                        .remove_component(id, change.net_id)
                        .map_err(|err| SyncError::apply(id, change.name.as_str(), err))?;
                    if !removed {
                        tracing::trace!(entity = %id, net_id = %change.net_id, "removal of untracked component ignored");
                    }
                    continue;
                }
                if world.components().has(id, change.net_id) {
                    continue;
                }
                let component = self
                    .factory
                    .create(&change.name)
                    .map_err(|err| SyncError::apply(id, change.name.as_str(), err))?;
                if component.net_id() != Some(change.net_id) {
                    let err = SyncError::desync(
                        id,
                        format!("{} is not registered under {}", change.name, change.net_id),
                    );
                    self.skip_key(err, report)?;
                    continue;
                }
                world
                    .add_component(id, component)
                    .map_err(|err| SyncError::apply(id, change.name.as_str(), err))?;
            }
        }

        let mut states: BTreeMap<NetId, (Option<&ComponentState>, Option<&ComponentState>)> =
            BTreeMap::new();
        for state in pending.current.into_iter().flat_map(|s| s.states.iter()) {
            states.entry(state.net_id).or_default().0 = Some(state);
        }
        for state in pending.next.into_iter().flat_map(|s| s.states.iter()) {
            states.entry(state.net_id).or_default().1 = Some(state);
        }

        for (net_id, (current, next)) in states {
            let Some(component) = world.components().try_slot(id, net_id).map(|slot| slot.name())
            else {
                let err = SyncError::desync(id, format!("state for untracked component {net_id}"));
                self.skip_key(err, report)?;
                continue;
            };
            world
                .apply_state(id, net_id, current, next)
                .map_err(|err| SyncError::apply(id, component, err))?;
        }
        Ok(())
    }

    /// Under the tolerant policy, log a per-entity failure and carry on.
    fn tolerate(&self, err: SyncError) -> Result<(), SyncError> {
        match self.config.policy {
            FailurePolicy::Strict => Err(err),
            FailurePolicy::Tolerant => {
                log_tolerated(&err);
                Ok(())
            }
        }
    }

    /// Under the tolerant policy, log a desynced key and count it as skipped.
    fn skip_key(&self, err: SyncError, report: &mut ApplyReport) -> Result<(), SyncError> {
        self.tolerate(err)?;
        report.skipped += 1;
        Ok(())
    }
}

fn prototype_of(world: &World, id: EntityId) -> String {
    world
        .record(id)
        .map(|record| record.prototype.clone())
        .unwrap_or_default()
}

fn log_tolerated(err: &SyncError) {
    match err {
        SyncError::ProtocolDesync { entity, reason } => {
            tracing::warn!(entity = %entity, reason = %reason, "desynced snapshot key skipped");
        }
        SyncError::ComponentApply {
            entity, component, ..
        } => {
            tracing::error!(entity = %entity, component = %component, error = %err, "component state apply failed");
        }
        SyncError::EntityCreation {
            entity, prototype, ..
        } => {
            tracing::error!(entity = %entity, prototype = %prototype, error = %err, "entity creation failed");
        }
        other => {
            tracing::error!(entity = ?other.entity(), error = %other, "snapshot failure");
        }
    }
}
