//! Axis-aligned bounding box

use crate::core::types::{Vec3, Mat4};

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted AABB that any point or box will expand
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area, used by the SAH split cost
    pub fn area(&self) -> f32 {
        if self.min.x > self.max.x {
            return 0.0;
        }
        let e = self.size();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Check if point is inside AABB
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// The 8 corners, in (z | y<<1 | x<<2) bit order
    pub fn corners(&self) -> [Vec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            Vec3::new(mn.x, mn.y, mn.z),
            Vec3::new(mn.x, mn.y, mx.z),
            Vec3::new(mn.x, mx.y, mn.z),
            Vec3::new(mn.x, mx.y, mx.z),
            Vec3::new(mx.x, mn.y, mn.z),
            Vec3::new(mx.x, mn.y, mx.z),
            Vec3::new(mx.x, mx.y, mn.z),
            Vec3::new(mx.x, mx.y, mx.z),
        ]
    }

    /// AABB of the 8 corners transformed by `matrix`
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut out = Aabb::empty();
        for c in self.corners() {
            out.expand(matrix.transform_point3(c));
        }
        out
    }
}
