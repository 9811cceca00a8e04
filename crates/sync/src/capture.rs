use replica_common::{EntityId, Tick};
use replica_kernel::World;

use crate::error::SyncError;
use crate::snapshot::{ComponentChange, EntitySnapshot};

/// Capture the replicated state of one entity.
///
/// Components modified after `since` contribute their state. A `since` of
/// zero, or an entity created after `since`, yields the full state together
/// with `Add` changes for components the prototype does not provide.
/// Returns `None` for unknown or client-local entities.
pub fn capture_entity(
    world: &World,
    id: EntityId,
    since: Tick,
) -> Result<Option<EntitySnapshot>, SyncError> {
    if id.is_client_side() {
        return Ok(None);
    }
    let Some(record) = world.record(id) else {
        return Ok(None);
    };
    let full = since == 0 || record.created > since;
    let mut snapshot = EntitySnapshot::new(id);

    for (net_id, slot) in world.components().networked(id) {
        let is_base = record.base_components.iter().any(|name| name == slot.name());
        if !is_base && (full || slot.created() > since) {
            snapshot
                .changes
                .push(ComponentChange::added(net_id, slot.name()));
        }
        if !full && slot.last_modified() <= since {
            continue;
        }
        let state = slot
            .component()
            .get_state()
            .map_err(|source| SyncError::Capture {
                entity: id,
                net_id,
                source,
            })?;
        if let Some(state) = state {
            snapshot.states.push(state);
        }
    }
    Ok(Some(snapshot))
}

/// Capture every networked entity with something to report since `since`,
/// in id order.
pub fn capture_world(world: &World, since: Tick) -> Result<Vec<EntitySnapshot>, SyncError> {
    let mut snapshots = Vec::new();
    for id in world.entities().ids() {
        if let Some(snapshot) = capture_entity(world, id, since)? {
            if !snapshot.is_empty() {
                snapshots.push(snapshot);
            }
        }
    }
    tracing::trace!(since, entities = snapshots.len(), "world captured");
    Ok(snapshots)
}
