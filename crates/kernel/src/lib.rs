//! World kernel: entity records, component storage and the spatial index,
//! mutated together through explicit lifecycle operations.
//!
//! # Invariants
//! - An entity is in the spatial index only while it is in the entity store.
//! - Lifecycle only moves forward: Allocated, Initializing, Initialized,
//!   Running, Deleted. Deleting twice is a no-op.
//! - Creation failures never leave a half-built entity behind.
//! - All state mutations flow through explicit operations and are logged.

pub mod config;
pub mod entity;
pub mod world;

pub use config::{TreeGrowth, WorldConfig};
pub use entity::{EntityRecord, EntityStore, LifecycleState};
pub use world::{World, WorldError, WorldEvent};

pub fn crate_info() -> &'static str {
    "replica-kernel v0.1.0"
}
