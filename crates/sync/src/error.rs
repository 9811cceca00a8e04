use replica_common::{EntityId, NetId};
use replica_ecs::ComponentError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of snapshot capture and reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The snapshot names something the local world does not track.
    #[error("protocol desync on entity {entity}: {reason}")]
    ProtocolDesync { entity: EntityId, reason: String },
    #[error("failed to apply {component} on entity {entity}: {source}")]
    ComponentApply {
        entity: EntityId,
        component: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to create entity {entity} from prototype {prototype:?}: {source}")]
    EntityCreation {
        entity: EntityId,
        prototype: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to capture {net_id} on entity {entity}: {source}")]
    Capture {
        entity: EntityId,
        net_id: NetId,
        #[source]
        source: ComponentError,
    },
    #[error("snapshot encode error: {0}")]
    Encode(String),
    #[error("snapshot decode error: {0}")]
    Decode(String),
}

impl SyncError {
    pub(crate) fn desync(entity: EntityId, reason: impl Into<String>) -> Self {
        Self::ProtocolDesync {
            entity,
            reason: reason.into(),
        }
    }

    pub(crate) fn apply(
        entity: EntityId,
        component: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ComponentApply {
            entity,
            component: component.into(),
            source: source.into(),
        }
    }

    pub(crate) fn creation(
        entity: EntityId,
        prototype: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::EntityCreation {
            entity,
            prototype: prototype.into(),
            source: source.into(),
        }
    }

    /// Entity the failure is about, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            SyncError::ProtocolDesync { entity, .. }
            | SyncError::ComponentApply { entity, .. }
            | SyncError::EntityCreation { entity, .. }
            | SyncError::Capture { entity, .. } => Some(*entity),
            SyncError::Encode(_) | SyncError::Decode(_) => None,
        }
    }

    pub fn is_desync(&self) -> bool {
        matches!(self, SyncError::ProtocolDesync { .. })
    }
}
