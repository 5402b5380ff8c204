//! Radiance-field grids: a dense lattice of cells over [-1,1]^3, each cell
//! carrying a density and 9 spherical-harmonic coefficients per color
//! channel, 28 floats in all.

use crate::core::types::{UVec3, Vec3};
use crate::math::Aabb;

/// Floats per cell: density, then 9 SH coefficients for each of r, g, b
pub const RF_CELL_SIZE: usize = 28;

/// SH band-0 weight applied to the DC coefficient
pub const SH_C0: f32 = 0.282_094_79;

#[derive(Clone, Copy)]
pub struct RfGridView<'a> {
    /// Cells per axis
    pub size: u32,
    /// Uniform scale applied to the [-1,1]^3 domain
    pub scale: f32,
    pub data: &'a [f32],
}

impl<'a> RfGridView<'a> {
    pub fn cell_count(&self) -> usize {
        (self.size * self.size * self.size) as usize
    }

    pub fn cell_index(&self, c: UVec3) -> usize {
        (c.z * self.size * self.size + c.y * self.size + c.x) as usize
    }

    /// Float offset of cell `idx`'s 28-float block
    pub fn cell_data(&self, idx: usize) -> &'a [f32] {
        &self.data[idx * RF_CELL_SIZE..(idx + 1) * RF_CELL_SIZE]
    }

    pub fn density(&self, idx: usize) -> f32 {
        self.data[idx * RF_CELL_SIZE]
    }

    /// View-independent color from the DC SH terms
    pub fn color_dc(&self, idx: usize) -> Vec3 {
        let cell = self.cell_data(idx);
        let decode = |v: f32| (SH_C0 * v + 0.5).clamp(0.0, 1.0);
        Vec3::new(decode(cell[1]), decode(cell[10]), decode(cell[19]))
    }

    pub fn cell_box(&self, c: UVec3) -> Aabb {
        let step = 2.0 * self.scale / self.size as f32;
        let min = Vec3::new(c.x as f32, c.y as f32, c.z as f32) * step
            - Vec3::splat(self.scale);
        Aabb::new(min, min + Vec3::splat(step))
    }

    /// Cell containing `pos`, or None outside the grid
    pub fn cell_of(&self, pos: Vec3) -> Option<UVec3> {
        let unit = (pos / self.scale) * 0.5 + Vec3::splat(0.5);
        if unit.cmplt(Vec3::ZERO).any() || unit.cmpge(Vec3::ONE).any() {
            return None;
        }
        let c = unit * self.size as f32;
        Some(UVec3::new(c.x as u32, c.y as u32, c.z as u32))
    }
}

/// Solid-sphere radiance field with constant color, for tests and benches
pub fn sphere_rf(size: u32, radius: f32, color: Vec3) -> Vec<f32> {
    let mut data = vec![0.0f32; (size * size * size) as usize * RF_CELL_SIZE];
    let step = 2.0 / size as f32;
    let encode = |v: f32| (v - 0.5) / SH_C0;
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let center = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * step
                    - Vec3::ONE;
                if center.length() <= radius {
                    let idx = ((z * size * size + y * size + x) as usize) * RF_CELL_SIZE;
                    data[idx] = 1.0;
                    data[idx + 1] = encode(color.x);
                    data[idx + 10] = encode(color.y);
                    data[idx + 19] = encode(color.z);
                }
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_occupancy() {
        let data = sphere_rf(16, 0.6, Vec3::new(1.0, 0.5, 0.25));
        let view = RfGridView { size: 16, scale: 1.0, data: &data };
        let inside = view.cell_of(Vec3::ZERO).unwrap();
        let idx = view.cell_index(inside);
        assert!(view.density(idx) > 0.0);
        let c = view.color_dc(idx);
        assert!((c - Vec3::new(1.0, 0.5, 0.25)).length() < 1e-5);

        let outside = view.cell_of(Vec3::new(0.9, 0.9, 0.9)).unwrap();
        assert_eq!(view.density(view.cell_index(outside)), 0.0);
    }

    #[test]
    fn test_cell_box_tiles_domain() {
        let view = RfGridView { size: 4, scale: 2.0, data: &[] };
        assert_eq!(view.cell_box(UVec3::ZERO).min, Vec3::splat(-2.0));
        assert_eq!(view.cell_box(UVec3::splat(3)).max, Vec3::splat(2.0));
    }
}
