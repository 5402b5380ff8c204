//! Per-representation leaf extraction: each appended geometry is reduced
//! to a list of boxes the BLAS is built over, plus whatever side tables
//! the leaf intersectors need to get from a leaf id back to payload data.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::core::types::{UVec3, Vec3};
use crate::geom::octree::SdfFrameOctreeNode;
use crate::geom::rf::{RfGridView, RF_CELL_SIZE};
use crate::geom::sbs::SdfSbsView;
use crate::geom::splat::GsSplat;
use crate::geom::svs::SdfSvsNode;
use crate::geom::hp::HpOctreeNode;
use crate::math::Aabb;

/// Dense-domain representations get two half-cube leaves so the pair
/// builder never sees a single box
pub fn domain_halves() -> Vec<Aabb> {
    vec![
        Aabb::new(Vec3::splat(-1.0), Vec3::new(0.0, 1.0, 1.0)),
        Aabb::new(Vec3::new(0.0, -1.0, -1.0), Vec3::ONE),
    ]
}

/// Leaf side record for frame octrees: the node a leaf box came from and
/// its cell placement, which the node itself does not carry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameLeaf {
    pub node: u32,
    pub min: Vec3,
    pub size: f32,
}

/// Walk a frame octree and keep the surface leaves: cells whose corner
/// minimum is non-positive but within one cell diagonal of the surface.
pub fn frame_octree_leaves(nodes: &[SdfFrameOctreeNode]) -> (Vec<Aabb>, Vec<FrameLeaf>) {
    let mut boxes = Vec::new();
    let mut leaves = Vec::new();
    let mut work = vec![(0u32, Vec3::splat(-1.0), 2.0f32)];
    while let Some((idx, min, size)) = work.pop() {
        let node = &nodes[idx as usize];
        if node.offset != 0 {
            for i in 0..8u32 {
                let off = Vec3::new(
                    (i >> 2 & 1) as f32,
                    (i >> 1 & 1) as f32,
                    (i & 1) as f32,
                );
                work.push((node.offset + i, min + off * size * 0.5, size * 0.5));
            }
            continue;
        }
        let vmin = node.values.iter().cloned().fold(f32::INFINITY, f32::min);
        if vmin <= 0.0 && vmin >= -(3.0f32.sqrt()) * size {
            boxes.push(Aabb::new(min, min + Vec3::splat(size)));
            leaves.push(FrameLeaf { node: idx, min, size });
        }
    }
    (boxes, leaves)
}

/// One leaf per stored voxel
pub fn svs_leaves(nodes: &[SdfSvsNode]) -> Vec<Aabb> {
    nodes.iter().map(|n| n.cell_box()).collect()
}

/// Brick-per-leaf extraction: one box per brick, leaf id == node id
pub fn sbs_brick_leaves(view: &SdfSbsView) -> Vec<Aabb> {
    view.nodes.iter().map(|n| n.brick_box()).collect()
}

/// Voxel-per-leaf extraction: one box per surface voxel and a
/// (node, linear voxel id) record per leaf
pub fn sbs_voxel_leaves(view: &SdfSbsView) -> (Vec<Aabb>, Vec<[u32; 2]>) {
    let bs = view.header.brick_size;
    let mut boxes = Vec::new();
    let mut remap = Vec::new();
    for (node_id, node) in view.nodes.iter().enumerate() {
        for z in 0..bs {
            for y in 0..bs {
                for x in 0..bs {
                    let v = UVec3::new(x, y, z);
                    if view.voxel_on_surface(node, v) {
                        boxes.push(view.voxel_box(node, v));
                        remap.push([node_id as u32, z * bs * bs + y * bs + x]);
                    }
                }
            }
        }
    }
    (boxes, remap)
}

/// One leaf per polynomial cell
pub fn hp_leaves(nodes: &[HpOctreeNode]) -> Vec<Aabb> {
    nodes.iter().map(|n| n.cell_box()).collect()
}

/// One leaf per splat's 3-sigma box
pub fn gs_leaves(splats: &[GsSplat]) -> Vec<Aabb> {
    splats.iter().map(|s| s.bounding_box()).collect()
}

/// Corner-block packing for radiance-field grids
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfPackMode {
    /// Duplicate the eight corner blocks per occupied cell; larger but
    /// each leaf reads a contiguous run
    Fast,
    /// Deduplicate corner blocks through a per-cell pointer table
    #[default]
    Compact,
}

/// Occupied-cell extraction for a radiance-field grid.
///
/// Returns one box and cell coordinate per occupied cell, the packed
/// corner blocks, and a pointer table of eight float offsets per cell
/// into those blocks. The scan parallelizes over z-slices; slice results
/// are concatenated in order so the output is stable across runs.
pub fn rf_leaves(
    view: &RfGridView,
    mode: RfPackMode,
) -> (Vec<Aabb>, Vec<UVec3>, Vec<f32>, Vec<u32>) {
    let size = view.size;
    let cells: Vec<UVec3> = (0..size)
        .into_par_iter()
        .flat_map_iter(|z| {
            let mut slice = Vec::new();
            for y in 0..size {
                for x in 0..size {
                    let c = UVec3::new(x, y, z);
                    if view.density(view.cell_index(c)) > 0.0 {
                        slice.push(c);
                    }
                }
            }
            slice
        })
        .collect();

    let boxes = cells.iter().map(|&c| view.cell_box(c)).collect();

    let mut data = Vec::new();
    let mut ptrs = Vec::with_capacity(cells.len() * 8);
    let mut dedup: HashMap<usize, u32> = HashMap::new();
    for &c in &cells {
        for i in 0..8u32 {
            let off = UVec3::new((i >> 2) & 1, (i >> 1) & 1, i & 1);
            let src = (c + off).min(UVec3::splat(size - 1));
            let src_idx = view.cell_index(src);
            let ptr = match mode {
                RfPackMode::Fast => {
                    let p = data.len() as u32;
                    data.extend_from_slice(view.cell_data(src_idx));
                    p
                }
                RfPackMode::Compact => *dedup.entry(src_idx).or_insert_with(|| {
                    let p = data.len() as u32;
                    data.extend_from_slice(view.cell_data(src_idx));
                    p
                }),
            };
            ptrs.push(ptr);
        }
    }
    debug_assert!(data.len() % RF_CELL_SIZE == 0);
    (boxes, cells, data, ptrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::octree::sphere_frame_octree;
    use crate::geom::rf::sphere_rf;
    use crate::geom::sbs::sphere_sbs;

    #[test]
    fn test_domain_halves_cover() {
        let halves = domain_halves();
        assert_eq!(halves.len(), 2);
        let union = halves[0].merged(&halves[1]);
        assert_eq!(union.min, Vec3::splat(-1.0));
        assert_eq!(union.max, Vec3::ONE);
    }

    #[test]
    fn test_frame_leaves_on_surface() {
        let nodes = sphere_frame_octree(4, 0.7);
        let (boxes, leaves) = frame_octree_leaves(&nodes);
        assert_eq!(boxes.len(), leaves.len());
        assert!(!boxes.is_empty());
        for (bb, leaf) in boxes.iter().zip(&leaves) {
            assert_eq!(bb.min, leaf.min);
            // surface distance from the cell never exceeds its diagonal
            let center_d = bb.center().length() - 0.7;
            assert!(center_d.abs() <= 3.0f32.sqrt() * leaf.size + 1e-5);
        }
    }

    #[test]
    fn test_sbs_voxel_leaves_subset_of_brick() {
        let (header, nodes, values) = sphere_sbs(4, 4, 2, 0.6);
        let view = SdfSbsView { header, nodes: &nodes, values: &values };
        let (boxes, remap) = sbs_voxel_leaves(&view);
        assert_eq!(boxes.len(), remap.len());
        for (bb, r) in boxes.iter().zip(&remap) {
            let brick = nodes[r[0] as usize].brick_box();
            assert!(bb.min.cmpge(brick.min - 1e-6).all());
            assert!(bb.max.cmple(brick.max + 1e-6).all());
        }
    }

    #[test]
    fn test_rf_modes_agree_on_cells() {
        let data = sphere_rf(8, 0.6, Vec3::ONE);
        let view = RfGridView { size: 8, scale: 1.0, data: &data };
        let (boxes_f, cells_f, data_f, ptrs_f) = rf_leaves(&view, RfPackMode::Fast);
        let (boxes_c, cells_c, data_c, ptrs_c) = rf_leaves(&view, RfPackMode::Compact);
        assert_eq!(cells_f, cells_c);
        assert_eq!(boxes_f.len(), boxes_c.len());
        assert_eq!(ptrs_f.len(), ptrs_c.len());
        // duplication only changes the packing, never the referenced floats
        for (pf, pc) in ptrs_f.iter().zip(&ptrs_c) {
            let bf = &data_f[*pf as usize..*pf as usize + RF_CELL_SIZE];
            let bc = &data_c[*pc as usize..*pc as usize + RF_CELL_SIZE];
            assert_eq!(bf, bc);
        }
        assert!(data_c.len() <= data_f.len());
    }

    #[test]
    fn test_rf_scan_deterministic() {
        let data = sphere_rf(12, 0.5, Vec3::ONE);
        let view = RfGridView { size: 12, scale: 1.0, data: &data };
        let a = rf_leaves(&view, RfPackMode::Compact);
        let b = rf_leaves(&view, RfPackMode::Compact);
        assert_eq!(a.1, b.1);
        assert_eq!(a.3, b.3);
    }
}
