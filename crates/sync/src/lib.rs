//! Snapshot replication between an authority and its clients.
//!
//! The authority captures [`EntitySnapshot`]s from its world; clients feed
//! each [`TickSnapshotMessage`] to a [`SnapshotReconciler`], which brings the
//! local world in line: creating, updating and deleting entities, and
//! keeping the spatial index consistent.
//!
//! # Invariants
//! - Deletions are processed after every state in the same message.
//! - A newly seen entity is either `Running` after a pass or gone entirely.
//! - `next` states are advisory; applying `current` alone is always enough.

mod capture;
mod error;
mod policy;
mod reconciler;
mod snapshot;

pub use capture::{capture_entity, capture_world};
pub use error::SyncError;
pub use policy::{FailurePolicy, ReconcilerConfig};
pub use reconciler::{ApplyReport, SnapshotReconciler};
pub use snapshot::{ComponentChange, EntitySnapshot, TickSnapshotMessage};

pub fn crate_info() -> &'static str {
    "replica-sync v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("sync"));
    }
}
