//! Axis-aligned bounding boxes for runner geometry
//!
//! Axes:
//! - x: along the track (obstacles approach from +x)
//! - y: height above the ground
//! - z: lateral, lane centers at `lane * LANE_WIDTH`

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in track space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box standing on `base_y` centered at (`x`, `z`)
    pub fn standing(x: f32, z: f32, base_y: f32, depth: f32, width: f32, height: f32) -> Self {
        Self::new(
            Vec3::new(x - depth / 2.0, base_y, z - width / 2.0),
            Vec3::new(x + depth / 2.0, base_y + height, z + width / 2.0),
        )
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Strict overlap: boxes that only touch do not overlap
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// True when the two boxes share some extent along the track
    pub fn overlaps_x(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x && self.max.x > other.min.x
    }

    /// Per-axis gap between the boxes (zero on axes where they overlap)
    pub fn gap(&self, other: &Aabb) -> Vec3 {
        let before = other.min - self.max;
        let after = self.min - other.max;
        before.max(after).max(Vec3::ZERO)
    }

    /// Euclidean distance between the closest points of the two boxes
    ///
    /// Zero when they overlap or touch.
    pub fn separation(&self, other: &Aabb) -> f32 {
        self.gap(other).length()
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}
