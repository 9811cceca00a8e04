//! Spatial index: a dynamic bounding-volume tree over fattened AABBs.
//!
//! # Invariants
//! - Leaves hold the tight box last reported for an item plus a fattened copy;
//!   internal nodes hold the union of their children's fattened boxes.
//! - Sibling subtree heights differ by at most one after every mutation.
//! - Node slots are addressed by stable indices. Growth never moves an
//!   existing index, and removed slots are recycled through a free list.
//! - Queries borrow the tree, so it cannot be mutated mid-traversal.

mod query;
mod tree;

pub use query::Query;
pub use tree::{DEFAULT_AABB_MARGIN, DynamicTree, GrowthFn};

pub fn crate_info() -> &'static str {
    "replica-spatial v0.1.0"
}
