use serde::{Deserialize, Serialize};

use replica_spatial::DEFAULT_AABB_MARGIN;

/// How the spatial index arena grows once its node capacity is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeGrowth {
    /// Add a fixed number of node slots.
    Linear(usize),
    #[default]
    Doubling,
}

impl TreeGrowth {
    /// Next capacity after `capacity`.
    pub fn grow(self, capacity: usize) -> usize {
        match self {
            TreeGrowth::Linear(step) => capacity + step,
            TreeGrowth::Doubling => capacity.saturating_mul(2),
        }
    }
}

/// Tuning for a [`World`](crate::World).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Node slots preallocated by the spatial index.
    pub tree_capacity: usize,
    pub tree_growth: TreeGrowth,
    /// Margin added around tight bounds when stored in the spatial index.
    pub aabb_margin: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tree_capacity: 256,
            tree_growth: TreeGrowth::Doubling,
            aabb_margin: DEFAULT_AABB_MARGIN,
        }
    }
}
