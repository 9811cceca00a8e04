use std::any::Any;

use replica_common::{Box2, NetId};

use crate::state::ComponentState;

/// Errors raised by component hooks and state payload handling.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("state for net id {got} delivered to component with net id {expected}")]
    WrongNetId { expected: NetId, got: NetId },
    #[error("unsupported state version {found} for net id {net_id} (expected {expected})")]
    UnsupportedVersion {
        net_id: NetId,
        expected: u16,
        found: u16,
    },
    #[error("failed to encode component state: {0}")]
    Encode(String),
    #[error("failed to decode component state: {0}")]
    Decode(String),
    #[error("invalid prototype data for {component}: {source}")]
    InvalidData {
        component: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{component} failed: {reason}")]
    Hook {
        component: &'static str,
        reason: String,
    },
}

impl ComponentError {
    /// Failure reported by a component's own hook.
    pub fn hook(component: &'static str, reason: impl Into<String>) -> Self {
        Self::Hook {
            component,
            reason: reason.into(),
        }
    }
}

/// Lifecycle sub-state of a single component, tracked by the table so that
/// implementations never have to remember to call a base hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentStage {
    Added,
    Initialized,
    Running,
}

/// Upcast helper so the table can downcast trait objects to concrete types.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A typed piece of entity data.
///
/// Only [`name`](Component::name) is required. Components with a
/// [`net_id`](Component::net_id) are replicated; the rest are purely local
/// and never appear in snapshots.
pub trait Component: AsAny {
    /// Name used by prototypes and by component changes on the wire.
    fn name(&self) -> &'static str;

    fn net_id(&self) -> Option<NetId> {
        None
    }

    /// Apply prototype configuration right after construction.
    fn expose_data(&mut self, _data: &serde_json::Value) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called once all of the entity's prototype components are present.
    fn initialize(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    fn startup(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Teardown hook, run before the component is detached.
    fn shutdown(&mut self) {}

    /// Authority side: the replicable state of this component.
    fn get_state(&self) -> Result<Option<ComponentState>, ComponentError> {
        Ok(None)
    }

    /// Client side: apply the state for the current tick and, when known,
    /// the next one. Either or both may be absent; both absent is a no-op.
    fn handle_state(
        &mut self,
        _current: Option<&ComponentState>,
        _next: Option<&ComponentState>,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Bounds relative to the entity position, if this component has extent.
    fn local_bounds(&self) -> Option<Box2> {
        None
    }
}
