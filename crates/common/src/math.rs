use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box. All containment and overlap tests are
/// inclusive of the boundary, so a zero-sized box still contains its point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Box2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Box2 {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box from left/bottom/right/top edges.
    pub fn from_edges(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self::new(Vec2::new(left, bottom), Vec2::new(right, top))
    }

    /// Zero-sized box at a point.
    pub fn point(p: Vec2) -> Self {
        Self::new(p, p)
    }

    /// Square of the given half extent centered on the origin.
    pub fn centered(half_extent: f32) -> Self {
        Self::new(Vec2::splat(-half_extent), Vec2::splat(half_extent))
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Grow every edge outward by `by`.
    pub fn enlarged(&self, by: f32) -> Self {
        Self::new(self.min - Vec2::splat(by), self.max + Vec2::splat(by))
    }

    pub fn translated(&self, by: Vec2) -> Self {
        Self::new(self.min + by, self.max + by)
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &Box2) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn contains(&self, other: &Box2) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Box2) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}
