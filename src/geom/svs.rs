//! Sparse voxel sets: a flat list of surface-crossing voxels, each packing
//! its lattice position, grid resolution and eight quantized corner
//! distances into 16 bytes.

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;
use crate::math::Aabb;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SdfSvsNode {
    /// x in the high 16 bits, y in the low 16
    pub pos_xy: u32,
    /// z in the high 16 bits, per-axis voxel count in the low 16
    pub pos_z_lod_size: u32,
    /// Eight corner bytes in (x<<2 | y<<1 | z) order, little-endian packed
    pub values: [u32; 2],
}

impl SdfSvsNode {
    pub fn new(pos: [u32; 3], lod_size: u32, corners: [f32; 8]) -> SdfSvsNode {
        debug_assert!(pos.iter().all(|&p| p < lod_size && lod_size <= 0xFFFF));
        let d_max = 2.0 * std::f32::consts::SQRT_2 / lod_size as f32;
        let mut values = [0u32; 2];
        for (i, &c) in corners.iter().enumerate() {
            let q = (((c + d_max) / (2.0 * d_max) * 255.0).round()).clamp(0.0, 255.0) as u32;
            values[i / 4] |= q << (8 * (i % 4));
        }
        SdfSvsNode {
            pos_xy: (pos[0] << 16) | pos[1],
            pos_z_lod_size: (pos[2] << 16) | lod_size,
            values,
        }
    }

    pub fn pos(&self) -> [u32; 3] {
        [self.pos_xy >> 16, self.pos_xy & 0xFFFF, self.pos_z_lod_size >> 16]
    }

    pub fn lod_size(&self) -> u32 {
        self.pos_z_lod_size & 0xFFFF
    }

    /// Quantization range: corner distances live in [-d_max, d_max]
    pub fn d_max(&self) -> f32 {
        2.0 * std::f32::consts::SQRT_2 / self.lod_size() as f32
    }

    pub fn corner(&self, i: usize) -> f32 {
        let byte = (self.values[i / 4] >> (8 * (i % 4))) & 0xFF;
        let d_max = self.d_max();
        -d_max + 2.0 * d_max * byte as f32 / 255.0
    }

    pub fn corners(&self) -> [f32; 8] {
        std::array::from_fn(|i| self.corner(i))
    }

    /// Voxel box within [-1,1]^3
    pub fn cell_box(&self) -> Aabb {
        let [x, y, z] = self.pos();
        let sz = self.lod_size() as f32;
        let min = 2.0 * Vec3::new(x as f32, y as f32, z as f32) / sz - Vec3::ONE;
        Aabb::new(min, min + Vec3::splat(2.0 / sz))
    }
}

/// Surface voxels of a sphere SDF at resolution `lod_size`, for tests and
/// benches
pub fn sphere_svs(lod_size: u32, radius: f32) -> Vec<SdfSvsNode> {
    let mut nodes = Vec::new();
    let cell = 2.0 / lod_size as f32;
    for x in 0..lod_size {
        for y in 0..lod_size {
            for z in 0..lod_size {
                let min = Vec3::new(x as f32, y as f32, z as f32) * cell - Vec3::ONE;
                let corners: [f32; 8] = std::array::from_fn(|i| {
                    let off = Vec3::new(
                        (i >> 2 & 1) as f32,
                        (i >> 1 & 1) as f32,
                        (i & 1) as f32,
                    );
                    (min + off * cell).length() - radius
                });
                let lo = corners.iter().cloned().fold(f32::INFINITY, f32::min);
                let hi = corners.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                if lo <= 0.0 && hi >= 0.0 {
                    nodes.push(SdfSvsNode::new([x, y, z], lod_size, corners));
                }
            }
        }
    }
    nodes
}
