//! Shared vocabulary for the replica crates: entity and network ids, ticks,
//! and the 2D axis-aligned bounding box used by the spatial index.

mod math;
mod types;

pub use math::Box2;
pub use types::{CLIENT_ID_BASE, EntityId, NetId, Tick};
