//! Sparse brick sets: surface bricks of `brick_size`^3 voxels, each brick
//! storing (brick_size + 2*brick_pad + 1)^3 quantized distance samples
//! packed into a shared u32 array at 1, 2 or 4 bytes per value.

use bytemuck::{Pod, Zeroable};

use crate::core::types::{UVec3, Vec3};
use crate::math::Aabb;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SdfSbsHeader {
    pub brick_size: u32,
    pub brick_pad: u32,
    pub bytes_per_value: u32,
    pub aux_data: u32,
}

impl SdfSbsHeader {
    /// Samples per axis within one brick's value block
    pub fn values_per_axis(&self) -> u32 {
        self.brick_size + 2 * self.brick_pad + 1
    }

    /// u32 words occupied by one brick's value block
    pub fn words_per_brick(&self) -> u32 {
        let count = self.values_per_axis().pow(3);
        let vals_per_word = 4 / self.bytes_per_value;
        count.div_ceil(vals_per_word)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SdfSbsNode {
    /// Brick lattice x in the high 16 bits, y in the low 16
    pub pos_xy: u32,
    /// Brick lattice z in the high 16 bits, bricks per axis in the low 16
    pub pos_z_lod_size: u32,
    /// First u32 word of this brick's value block
    pub data_offset: u32,
}

impl SdfSbsNode {
    pub fn pos(&self) -> [u32; 3] {
        [self.pos_xy >> 16, self.pos_xy & 0xFFFF, self.pos_z_lod_size >> 16]
    }

    pub fn lod_size(&self) -> u32 {
        self.pos_z_lod_size & 0xFFFF
    }

    /// Brick box within [-1,1]^3
    pub fn brick_box(&self) -> Aabb {
        let [x, y, z] = self.pos();
        let sz = self.lod_size() as f32;
        let min = 2.0 * Vec3::new(x as f32, y as f32, z as f32) / sz - Vec3::ONE;
        Aabb::new(min, min + Vec3::splat(2.0 / sz))
    }
}

#[derive(Clone, Copy)]
pub struct SdfSbsView<'a> {
    pub header: SdfSbsHeader,
    pub nodes: &'a [SdfSbsNode],
    pub values: &'a [u32],
}

impl<'a> SdfSbsView<'a> {
    /// Quantization range of `node`: one voxel diagonal-ish band around zero
    pub fn d_max(&self, node: &SdfSbsNode) -> f32 {
        2.0 * std::f32::consts::SQRT_2 / (node.lod_size() * self.header.brick_size) as f32
    }

    /// Decoded sample at lattice coordinate `v` inside `node`'s value block
    pub fn value(&self, node: &SdfSbsNode, v: UVec3) -> f32 {
        let vpa = self.header.values_per_axis();
        debug_assert!(v.x < vpa && v.y < vpa && v.z < vpa);
        let local = (v.z * vpa * vpa + v.y * vpa + v.x) as usize;
        let bits = 8 * self.header.bytes_per_value;
        let vals_per_word = (4 / self.header.bytes_per_value) as usize;
        let word = self.values[node.data_offset as usize + local / vals_per_word];
        let raw = if bits == 32 {
            word as u64
        } else {
            ((word >> (bits * (local % vals_per_word) as u32)) & ((1u32 << bits) - 1)) as u64
        };
        let max_val = ((1u64 << bits) - 1) as f32;
        let d_max = self.d_max(node);
        -d_max + 2.0 * d_max * raw as f32 / max_val
    }

    /// World size of one voxel inside `node`
    pub fn voxel_size(&self, node: &SdfSbsNode) -> f32 {
        2.0 / (node.lod_size() * self.header.brick_size) as f32
    }

    /// Box of voxel `v` (brick-local, ignoring padding) within [-1,1]^3
    pub fn voxel_box(&self, node: &SdfSbsNode, v: UVec3) -> Aabb {
        let d = self.voxel_size(node);
        let min = node.brick_box().min + Vec3::new(v.x as f32, v.y as f32, v.z as f32) * d;
        Aabb::new(min, min + Vec3::splat(d))
    }

    /// Corner samples of voxel `v`, in (x<<2 | y<<1 | z) order
    pub fn voxel_corners(&self, node: &SdfSbsNode, v: UVec3) -> [f32; 8] {
        let pad = UVec3::splat(self.header.brick_pad);
        std::array::from_fn(|i| {
            let off = UVec3::new((i as u32 >> 2) & 1, (i as u32 >> 1) & 1, i as u32 & 1);
            self.value(node, v + off + pad)
        })
    }

    /// True when voxel `v`'s corner band crosses zero
    pub fn voxel_on_surface(&self, node: &SdfSbsNode, v: UVec3) -> bool {
        let c = self.voxel_corners(node, v);
        let lo = c.iter().cloned().fold(f32::INFINITY, f32::min);
        lo <= 0.0
    }
}

fn quantize(value: f32, d_max: f32, bits: u32) -> u32 {
    let max_val = ((1u64 << bits) - 1) as f32;
    ((value + d_max) / (2.0 * d_max) * max_val).round().clamp(0.0, max_val) as u32
}

/// Surface bricks of a sphere SDF, for tests and benches. `lod_size`
/// bricks per axis, no padding.
pub fn sphere_sbs(
    lod_size: u32,
    brick_size: u32,
    bytes_per_value: u32,
    radius: f32,
) -> (SdfSbsHeader, Vec<SdfSbsNode>, Vec<u32>) {
    let header = SdfSbsHeader { brick_size, brick_pad: 0, bytes_per_value, aux_data: 0 };
    let mut nodes = Vec::new();
    let mut values = Vec::new();
    let vpa = header.values_per_axis();
    let bits = 8 * bytes_per_value;
    let vals_per_word = 4 / bytes_per_value;
    let voxel = 2.0 / (lod_size * brick_size) as f32;
    let d_max = 2.0 * std::f32::consts::SQRT_2 / (lod_size * brick_size) as f32;

    for bx in 0..lod_size {
        for by in 0..lod_size {
            for bz in 0..lod_size {
                let min = 2.0 * Vec3::new(bx as f32, by as f32, bz as f32) / lod_size as f32
                    - Vec3::ONE;
                let mut samples = Vec::with_capacity(vpa.pow(3) as usize);
                let mut lo = f32::INFINITY;
                let mut hi = f32::NEG_INFINITY;
                for z in 0..vpa {
                    for y in 0..vpa {
                        for x in 0..vpa {
                            let p = min + Vec3::new(x as f32, y as f32, z as f32) * voxel;
                            let d = p.length() - radius;
                            lo = lo.min(d);
                            hi = hi.max(d);
                            samples.push(d);
                        }
                    }
                }
                if lo > 0.0 || hi < 0.0 {
                    continue;
                }
                let data_offset = values.len() as u32;
                values.resize(values.len() + header.words_per_brick() as usize, 0u32);
                for (i, &s) in samples.iter().enumerate() {
                    let q = quantize(s, d_max, bits);
                    let w = data_offset as usize + i / vals_per_word as usize;
                    values[w] |= q << (bits * (i as u32 % vals_per_word));
                }
                nodes.push(SdfSbsNode {
                    pos_xy: (bx << 16) | by,
                    pos_z_lod_size: (bz << 16) | lod_size,
                    data_offset,
                });
            }
        }
    }
    (header, nodes, values)
}
