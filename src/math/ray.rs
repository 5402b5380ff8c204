//! Ray type and operations

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Precomputed 1/direction for fast AABB intersection
    pub inv_direction: Vec3,
}

/// Componentwise 1/d with huge-but-finite values on zero components,
/// so the slab test stays well defined for axis-aligned rays.
pub fn safe_inverse(d: Vec3) -> Vec3 {
    const EPS: f32 = 1e-24;
    Vec3::new(
        if d.x.abs() > EPS { 1.0 / d.x } else { 1.0 / EPS.copysign(d.x) },
        if d.y.abs() > EPS { 1.0 / d.y } else { 1.0 / EPS.copysign(d.y) },
        if d.z.abs() > EPS { 1.0 / d.z } else { 1.0 / EPS.copysign(d.z) },
    )
}

/// Slab test returning the raw (t_near, t_far) interval.
///
/// The interval is valid iff t_near <= t_far; the caller compares it
/// against its own near/far and the running hit distance.
pub fn ray_box_interval(origin: Vec3, inv_dir: Vec3, box_min: Vec3, box_max: Vec3) -> (f32, f32) {
    let t1 = (box_min - origin) * inv_dir;
    let t2 = (box_max - origin) * inv_dir;
    let t_min = t1.min(t2);
    let t_max = t1.max(t2);
    (
        t_min.x.max(t_min.y).max(t_min.z),
        t_max.x.min(t_max.y).min(t_max.z),
    )
}

impl Ray {
    /// Create a new ray; direction need not be normalized
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: safe_inverse(direction),
        }
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray-AABB intersection using slab method
    /// Returns Some((t_near, t_far)) if intersection, None otherwise
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let (t_near, t_far) = ray_box_interval(self.origin, self.inv_direction, aabb.min, aabb.max);
        if t_near <= t_far && t_far >= 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.at(5.0), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_intersects_aabb_hit() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let (t_near, t_far) = ray.intersects_aabb(&aabb).unwrap();
        assert!((t_near - 2.0).abs() < 0.001);
        assert!((t_far - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_intersects_aabb_miss() {
        let ray = Ray::new(Vec3::new(-2.0, 5.0, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(ray.intersects_aabb(&aabb).is_none());
    }

    #[test]
    fn test_axis_aligned_ray_on_boundary() {
        // zero direction component must not produce NaN in the interval
        let ray = Ray::new(Vec3::new(0.5, 0.5, -2.0), Vec3::Z);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let (t_near, _) = ray.intersects_aabb(&aabb).unwrap();
        assert!((t_near - 2.0).abs() < 0.001);
    }
}
