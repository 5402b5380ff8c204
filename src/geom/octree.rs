//! Octree SDF encodings over [-1,1]^3. Two node flavors share the same
//! child layout: a non-zero `offset` points at eight contiguous children,
//! child `i` covering the half-cube selected by bits (x<<2 | y<<1 | z).

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;

/// Scalar octree node: one signed distance sample at the cell center
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SdfOctreeNode {
    pub value: f32,
    /// Index of the first of 8 children within the same octree, 0 for a leaf
    pub offset: u32,
}

/// Frame octree node: signed distances at the eight cell corners,
/// in (x<<2 | y<<1 | z) order
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SdfFrameOctreeNode {
    pub values: [f32; 8],
    pub offset: u32,
}

fn descend(pos: Vec3) -> (usize, Vec3) {
    let gx = (pos.x >= 0.0) as usize;
    let gy = (pos.y >= 0.0) as usize;
    let gz = (pos.z >= 0.0) as usize;
    let child = (gx << 2) | (gy << 1) | gz;
    let shift = Vec3::new(gx as f32, gy as f32, gz as f32) - Vec3::splat(0.5);
    // remap the chosen half-cube back onto [-1,1]^3
    (child, 2.0 * (pos - shift))
}

/// Leaf sample of a scalar octree at `pos` in [-1,1]^3. Child offsets
/// index `nodes` directly, so a tree stored inside a larger arena is
/// walked from its `root`.
pub fn eval_distance_octree(nodes: &[SdfOctreeNode], root: usize, mut pos: Vec3) -> f32 {
    let mut idx = root;
    while nodes[idx].offset != 0 {
        let (child, next) = descend(pos);
        idx = nodes[idx].offset as usize + child;
        pos = next;
    }
    nodes[idx].value
}

/// Trilinear sample of a frame octree at `pos` in [-1,1]^3
pub fn eval_distance_frame_octree(nodes: &[SdfFrameOctreeNode], root: usize, mut pos: Vec3) -> f32 {
    let mut idx = root;
    while nodes[idx].offset != 0 {
        let (child, next) = descend(pos);
        idx = nodes[idx].offset as usize + child;
        pos = next;
    }
    let frac = pos * 0.5 + Vec3::splat(0.5);
    crate::trace::solver::eval_dist_trilinear(&nodes[idx].values, frac)
}

fn sphere_sdf(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Scalar octree sampling of a sphere SDF, subdivided to `depth` near the
/// surface. For tests and benches.
pub fn sphere_octree(depth: u32, radius: f32) -> Vec<SdfOctreeNode> {
    let mut nodes = vec![SdfOctreeNode::default()];
    let mut work = vec![(0usize, Vec3::ZERO, 1.0f32, 0u32)];
    while let Some((idx, center, half, level)) = work.pop() {
        let d = sphere_sdf(center, radius);
        nodes[idx].value = d;
        let near_surface = d.abs() < 3.0f32.sqrt() * half;
        if level < depth && near_surface {
            let offset = nodes.len();
            nodes[idx].offset = offset as u32;
            nodes.resize(offset + 8, SdfOctreeNode::default());
            for i in 0..8usize {
                let dir = Vec3::new(
                    (i >> 2 & 1) as f32 * 2.0 - 1.0,
                    (i >> 1 & 1) as f32 * 2.0 - 1.0,
                    (i & 1) as f32 * 2.0 - 1.0,
                );
                work.push((offset + i, center + dir * half * 0.5, half * 0.5, level + 1));
            }
        }
    }
    nodes
}

/// Frame octree sampling of a sphere SDF, for tests and benches
pub fn sphere_frame_octree(depth: u32, radius: f32) -> Vec<SdfFrameOctreeNode> {
    let mut nodes = vec![SdfFrameOctreeNode::default()];
    let mut work = vec![(0usize, Vec3::ZERO, 1.0f32, 0u32)];
    while let Some((idx, center, half, level)) = work.pop() {
        for i in 0..8usize {
            let dir = Vec3::new(
                (i >> 2 & 1) as f32 * 2.0 - 1.0,
                (i >> 1 & 1) as f32 * 2.0 - 1.0,
                (i & 1) as f32 * 2.0 - 1.0,
            );
            nodes[idx].values[i] = sphere_sdf(center + dir * half, radius);
        }
        let near_surface = sphere_sdf(center, radius).abs() < 3.0f32.sqrt() * half;
        if level < depth && near_surface {
            let offset = nodes.len();
            nodes[idx].offset = offset as u32;
            nodes.resize(offset + 8, SdfFrameOctreeNode::default());
            for i in 0..8usize {
                let dir = Vec3::new(
                    (i >> 2 & 1) as f32 * 2.0 - 1.0,
                    (i >> 1 & 1) as f32 * 2.0 - 1.0,
                    (i & 1) as f32 * 2.0 - 1.0,
                );
                work.push((offset + i, center + dir * half * 0.5, half * 0.5, level + 1));
            }
        }
    }
    nodes
}
