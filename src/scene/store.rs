//! The geometry store: shared arenas for every representation's payload,
//! one BLAS array shared by all geometries, and a `GeomData` record per
//! geometry tying payload offsets to its BVH.
//!
//! Every `add_*` follows the same contract: validate, compute the local
//! bounding box, append the payload while capturing the arena lengths
//! that existed before, fix up intra-payload references by those offsets,
//! extract leaf boxes, build the BLAS, then push the `GeomData` record.

use bytemuck::{Pod, Zeroable};

use crate::bvh::{build_bvh_pairs, BuildPreset, BvhNodePair, MAX_LEAVES};
use crate::core::error::Error;
use crate::core::types::{UVec3, Vec3, Vec4};
use crate::core::Result;
use crate::geom::grid::SdfGridView;
use crate::geom::hp::HpOctreeNode;
use crate::geom::mesh::MeshView;
use crate::geom::octree::{SdfFrameOctreeNode, SdfOctreeNode};
use crate::geom::rf::RfGridView;
use crate::geom::sbs::{SdfSbsHeader, SdfSbsNode, SdfSbsView};
use crate::geom::splat::GsSplat;
use crate::geom::svs::SdfSvsNode;
use crate::geom::{GeomType, MAX_PAYLOAD};
use crate::math::Aabb;
use crate::scene::extract;
use crate::scene::extract::{FrameLeaf, RfPackMode};

/// Per-geometry record, laid out for direct GPU upload
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GeomData {
    pub box_min: Vec4,
    pub box_max: Vec4,
    /// Representation-specific payload offsets, see the `add_*` methods
    pub offset: [u32; 2],
    /// First pair of this geometry's BLAS within the shared node array
    pub bvh_offset: u32,
    pub kind: u32,
}

impl GeomData {
    pub fn kind(&self) -> GeomType {
        GeomType::from_u32(self.kind).unwrap_or(GeomType::TriangleMesh)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.box_min.truncate(), self.box_max.truncate())
    }
}

/// Arena sizes reported by [`GeometryStore::stats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub geom_count: usize,
    pub blas_pairs: usize,
    pub triangles: usize,
    pub grid_samples: usize,
    pub octree_nodes: usize,
    pub svs_nodes: usize,
    pub sbs_value_words: usize,
    pub hp_coeffs: usize,
    pub rf_floats: usize,
    pub splats: usize,
}

#[derive(Default)]
pub struct GeometryStore {
    pub geom_data: Vec<GeomData>,
    /// All BLAS pair arrays, back to back
    pub nodes: Vec<BvhNodePair>,

    // triangle meshes
    pub vertices: Vec<Vec4>,
    pub indices: Vec<u32>,

    // dense grids
    pub grid_offsets: Vec<u32>,
    pub grid_sizes: Vec<UVec3>,
    pub grid_data: Vec<f32>,

    // scalar and frame octrees
    pub octree_nodes: Vec<SdfOctreeNode>,
    pub frame_nodes: Vec<SdfFrameOctreeNode>,
    pub frame_leaves: Vec<FrameLeaf>,

    // sparse voxel sets
    pub svs_nodes: Vec<SdfSvsNode>,

    // sparse brick sets
    pub sbs_headers: Vec<SdfSbsHeader>,
    pub sbs_node_offsets: Vec<u32>,
    pub sbs_value_offsets: Vec<u32>,
    pub sbs_remap_offsets: Vec<u32>,
    pub sbs_nodes: Vec<SdfSbsNode>,
    pub sbs_values: Vec<u32>,
    pub sbs_remap: Vec<[u32; 2]>,

    // hp octrees
    pub hp_node_offsets: Vec<u32>,
    pub hp_data_offsets: Vec<u32>,
    pub hp_nodes: Vec<HpOctreeNode>,
    pub hp_data: Vec<f32>,

    // radiance fields
    pub rf_sizes: Vec<u32>,
    pub rf_scales: Vec<f32>,
    pub rf_data_offsets: Vec<u32>,
    pub rf_leaf_offsets: Vec<u32>,
    pub rf_data: Vec<f32>,
    pub rf_cells: Vec<UVec3>,
    pub rf_ptrs: Vec<u32>,

    // gaussian splats
    pub gs_splats: Vec<GsSplat>,
    pub gs_conics: Vec<[Vec3; 3]>,

    pub build_preset: BuildPreset,
}

impl GeometryStore {
    pub fn with_preset(build_preset: BuildPreset) -> GeometryStore {
        GeometryStore { build_preset, ..Default::default() }
    }

    pub fn geom_count(&self) -> usize {
        self.geom_data.len()
    }

    pub fn geom(&self, geom_id: u32) -> Result<&GeomData> {
        self.geom_data.get(geom_id as usize).ok_or(Error::BadGeomId(geom_id))
    }

    fn check_payload(what: &'static str, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::EmptyPayload(what));
        }
        if count > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge { what, count, limit: MAX_PAYLOAD });
        }
        Ok(())
    }

    /// Leaf offsets are 24-bit, so trees past `MAX_LEAVES` are rejected
    fn check_leaf_count(what: &'static str, count: usize) -> Result<()> {
        if count > MAX_LEAVES {
            return Err(Error::PayloadTooLarge { what, count, limit: MAX_LEAVES });
        }
        Ok(())
    }

    /// Build a BLAS over `boxes` and append it, returning its pair offset
    fn append_blas(&mut self, boxes: &[Aabb]) -> Result<u32> {
        Self::check_leaf_count("blas leaves", boxes.len())?;
        let bvh_offset = self.nodes.len() as u32;
        let tree = build_bvh_pairs(boxes, self.build_preset);
        log::debug!(
            "BLAS #{}: {} leaves, {} pairs",
            self.geom_data.len(),
            boxes.len(),
            tree.pairs.len()
        );
        self.nodes.extend_from_slice(&tree.pairs);
        Ok(bvh_offset)
    }

    fn push_geom(&mut self, kind: GeomType, bounds: Aabb, offset: [u32; 2], bvh_offset: u32) -> u32 {
        let geom_id = self.geom_data.len() as u32;
        self.geom_data.push(GeomData {
            box_min: bounds.min.extend(1.0),
            box_max: bounds.max.extend(1.0),
            offset,
            bvh_offset,
            kind: kind as u32,
        });
        geom_id
    }

    /// Append an indexed triangle mesh. `indices` address `vertices`
    /// locally; the stored copy is fixed up to the shared vertex arena.
    pub fn add_triangles(&mut self, vertices: &[Vec4], indices: &[u32]) -> Result<u32> {
        Self::check_payload("vertices", vertices.len())?;
        Self::check_payload("indices", indices.len())?;
        debug_assert_eq!(indices.len() % 3, 0);

        let view = MeshView { vertices, indices };
        let bounds = view.bounds();

        let vertex_offset = self.vertices.len() as u32;
        let index_offset = self.indices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        self.indices.extend(indices.iter().map(|&i| i + vertex_offset));

        let boxes: Vec<Aabb> = (0..view.triangle_count()).map(|t| view.triangle_box(t)).collect();
        let bvh_offset = self.append_blas(&boxes)?;
        Ok(self.push_geom(GeomType::TriangleMesh, bounds, [index_offset, vertex_offset], bvh_offset))
    }

    /// Append a dense SDF grid over [-1,1]^3
    pub fn add_sdf_grid(&mut self, size: UVec3, data: &[f32]) -> Result<u32> {
        Self::check_payload("grid samples", data.len())?;
        debug_assert_eq!(data.len(), (size.x * size.y * size.z) as usize);

        let grid_id = self.grid_offsets.len() as u32;
        self.grid_offsets.push(self.grid_data.len() as u32);
        self.grid_sizes.push(size);
        self.grid_data.extend_from_slice(data);

        let bvh_offset = self.append_blas(&extract::domain_halves())?;
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        Ok(self.push_geom(GeomType::SdfGrid, bounds, [grid_id, 0], bvh_offset))
    }

    /// Append a scalar octree; child offsets are fixed up into the shared
    /// node arena
    pub fn add_sdf_octree(&mut self, nodes: &[SdfOctreeNode]) -> Result<u32> {
        Self::check_payload("octree nodes", nodes.len())?;

        let root = self.octree_nodes.len() as u32;
        self.octree_nodes.extend(nodes.iter().map(|n| SdfOctreeNode {
            value: n.value,
            offset: if n.offset == 0 { 0 } else { n.offset + root },
        }));

        let bvh_offset = self.append_blas(&extract::domain_halves())?;
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        Ok(self.push_geom(GeomType::SdfOctree, bounds, [root, 0], bvh_offset))
    }

    /// Append a frame octree; leaves are filtered down to surface cells
    pub fn add_sdf_frame_octree(&mut self, nodes: &[SdfFrameOctreeNode]) -> Result<u32> {
        Self::check_payload("frame octree nodes", nodes.len())?;

        let root = self.frame_nodes.len() as u32;
        let leaf_offset = self.frame_leaves.len() as u32;
        self.frame_nodes.extend(nodes.iter().map(|n| SdfFrameOctreeNode {
            values: n.values,
            offset: if n.offset == 0 { 0 } else { n.offset + root },
        }));

        let (boxes, leaves) = extract::frame_octree_leaves(nodes);
        Self::check_payload("frame octree surface leaves", boxes.len())?;
        self.frame_leaves.extend(leaves);

        let bvh_offset = self.append_blas(&boxes)?;
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        Ok(self.push_geom(GeomType::SdfFrameOctree, bounds, [root, leaf_offset], bvh_offset))
    }

    /// Append a sparse voxel set; leaf id == local node index
    pub fn add_sdf_svs(&mut self, nodes: &[SdfSvsNode]) -> Result<u32> {
        Self::check_payload("svs nodes", nodes.len())?;

        let root = self.svs_nodes.len() as u32;
        self.svs_nodes.extend_from_slice(nodes);

        let boxes = extract::svs_leaves(nodes);
        let bvh_offset = self.append_blas(&boxes)?;
        // SDF domains are always the unit cube, however sparse the leaves
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        Ok(self.push_geom(GeomType::SdfSvs, bounds, [root, 0], bvh_offset))
    }

    /// Append a sparse brick set. `single_node` selects brick-per-leaf
    /// packing; otherwise each surface voxel gets its own leaf through a
    /// (node, voxel) remap table.
    pub fn add_sdf_sbs(
        &mut self,
        header: SdfSbsHeader,
        nodes: &[SdfSbsNode],
        values: &[u32],
        single_node: bool,
    ) -> Result<u32> {
        Self::check_payload("sbs nodes", nodes.len())?;
        Self::check_payload("sbs values", values.len())?;
        if !matches!(header.bytes_per_value, 1 | 2 | 4) {
            return Err(Error::BadValueWidth(header.bytes_per_value));
        }

        let sbs_id = self.sbs_headers.len() as u32;
        let node_offset = self.sbs_nodes.len() as u32;
        let value_offset = self.sbs_values.len() as u32;
        let remap_offset = self.sbs_remap.len() as u32;
        self.sbs_headers.push(header);
        self.sbs_node_offsets.push(node_offset);
        self.sbs_value_offsets.push(value_offset);
        self.sbs_remap_offsets.push(remap_offset);
        self.sbs_nodes.extend(nodes.iter().map(|n| SdfSbsNode {
            data_offset: n.data_offset + value_offset,
            ..*n
        }));
        self.sbs_values.extend_from_slice(values);

        let view = SdfSbsView { header, nodes, values };
        let (boxes, kind) = if single_node {
            (extract::sbs_brick_leaves(&view), GeomType::SdfSbsSingleNode)
        } else {
            let (boxes, remap) = extract::sbs_voxel_leaves(&view);
            Self::check_payload("sbs surface voxels", boxes.len())?;
            self.sbs_remap.extend(remap);
            (boxes, GeomType::SdfSbs)
        };

        let bvh_offset = self.append_blas(&boxes)?;
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        Ok(self.push_geom(kind, bounds, [sbs_id, 0], bvh_offset))
    }

    /// Append an hp octree's leaf cells with their coefficient data
    pub fn add_sdf_hp_octree(&mut self, nodes: &[HpOctreeNode], data: &[f32]) -> Result<u32> {
        Self::check_payload("hp nodes", nodes.len())?;
        Self::check_payload("hp coefficients", data.len())?;

        let hp_id = self.hp_node_offsets.len() as u32;
        let data_offset = self.hp_data.len() as u32;
        self.hp_node_offsets.push(self.hp_nodes.len() as u32);
        self.hp_data_offsets.push(data_offset);
        self.hp_nodes.extend(nodes.iter().map(|n| HpOctreeNode {
            data_offset: n.data_offset + data_offset,
            ..*n
        }));
        self.hp_data.extend_from_slice(data);

        let boxes = extract::hp_leaves(nodes);
        let bvh_offset = self.append_blas(&boxes)?;
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        Ok(self.push_geom(GeomType::SdfHpOctree, bounds, [hp_id, 0], bvh_offset))
    }

    /// Append a radiance-field grid. Only the corner blocks of occupied
    /// cells are retained, packed per `mode`.
    pub fn add_rf_grid(
        &mut self,
        size: u32,
        scale: f32,
        data: &[f32],
        mode: RfPackMode,
    ) -> Result<u32> {
        Self::check_payload("rf cells", data.len())?;

        let view = RfGridView { size, scale, data };
        let (boxes, cells, packed, ptrs) = extract::rf_leaves(&view, mode);
        Self::check_payload("rf occupied cells", boxes.len())?;

        let rf_id = self.rf_sizes.len() as u32;
        self.rf_sizes.push(size);
        self.rf_scales.push(scale);
        self.rf_data_offsets.push(self.rf_data.len() as u32);
        self.rf_leaf_offsets.push(self.rf_cells.len() as u32);
        self.rf_data.extend(packed);
        self.rf_cells.extend(cells);
        self.rf_ptrs.extend(ptrs);

        let bvh_offset = self.append_blas(&boxes)?;
        let bounds = Aabb::new(Vec3::splat(-scale), Vec3::splat(scale));
        Ok(self.push_geom(GeomType::RfGrid, bounds, [rf_id, 0], bvh_offset))
    }

    /// Append a set of gaussian splats; conics are precomputed per splat
    pub fn add_gs_splats(&mut self, splats: &[GsSplat]) -> Result<u32> {
        Self::check_payload("splats", splats.len())?;

        let splat_offset = self.gs_splats.len() as u32;
        self.gs_splats.extend_from_slice(splats);
        self.gs_conics.extend(splats.iter().map(|s| {
            let m = s.conic();
            [m.x_axis, m.y_axis, m.z_axis]
        }));

        let boxes = extract::gs_leaves(splats);
        let bvh_offset = self.append_blas(&boxes)?;
        let bounds = boxes.iter().fold(Aabb::empty(), |a, b| a.merged(b));
        Ok(self.push_geom(GeomType::GaussianSplats, bounds, [splat_offset, 0], bvh_offset))
    }

    /// Grid view for geometry `g`, which must be an SdfGrid
    pub fn grid_view(&self, g: &GeomData) -> SdfGridView<'_> {
        let grid_id = g.offset[0] as usize;
        let start = self.grid_offsets[grid_id] as usize;
        let size = self.grid_sizes[grid_id];
        let len = (size.x * size.y * size.z) as usize;
        SdfGridView { size, data: &self.grid_data[start..start + len] }
    }

    /// Brick-set view for geometry `g`, which must be an SBS flavor
    pub fn sbs_view(&self, g: &GeomData) -> SdfSbsView<'_> {
        let sbs_id = g.offset[0] as usize;
        let node_start = self.sbs_node_offsets[sbs_id] as usize;
        let node_end = self
            .sbs_node_offsets
            .get(sbs_id + 1)
            .map(|&o| o as usize)
            .unwrap_or(self.sbs_nodes.len());
        SdfSbsView {
            header: self.sbs_headers[sbs_id],
            nodes: &self.sbs_nodes[node_start..node_end],
            values: &self.sbs_values,
        }
    }

    /// Drop every geometry and payload, keeping the build preset
    pub fn clear(&mut self) {
        *self = GeometryStore { build_preset: self.build_preset, ..Default::default() };
    }

    /// Aggregate arena sizes, for logging and capacity planning
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            geom_count: self.geom_data.len(),
            blas_pairs: self.nodes.len(),
            triangles: self.indices.len() / 3,
            grid_samples: self.grid_data.len(),
            octree_nodes: self.octree_nodes.len() + self.frame_nodes.len(),
            svs_nodes: self.svs_nodes.len(),
            sbs_value_words: self.sbs_values.len(),
            hp_coeffs: self.hp_data.len(),
            rf_floats: self.rf_data.len(),
            splats: self.gs_splats.len(),
        }
    }

    /// Signed distance of `pos` through geometry `geom_id`'s field, for
    /// representations that define one everywhere in their domain
    pub fn eval_distance(&self, geom_id: u32, pos: Vec3) -> Result<Option<f32>> {
        let g = *self.geom(geom_id)?;
        Ok(match g.kind() {
            GeomType::SdfGrid => Some(self.grid_view(&g).eval_distance(pos)),
            GeomType::SdfOctree => Some(crate::geom::octree::eval_distance_octree(
                &self.octree_nodes,
                g.offset[0] as usize,
                pos,
            )),
            GeomType::SdfFrameOctree => Some(crate::geom::octree::eval_distance_frame_octree(
                &self.frame_nodes,
                g.offset[0] as usize,
                pos,
            )),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::grid::sphere_grid;
    use crate::geom::hp::sphere_hp;
    use crate::geom::mesh::unit_cube_mesh;
    use crate::geom::octree::{sphere_frame_octree, sphere_octree};
    use crate::geom::sbs::sphere_sbs;
    use crate::geom::svs::sphere_svs;

    #[test]
    fn test_empty_payload_rejected() {
        let mut store = GeometryStore::default();
        assert!(matches!(store.add_sdf_svs(&[]), Err(Error::EmptyPayload(_))));
        assert!(matches!(store.add_triangles(&[], &[]), Err(Error::EmptyPayload(_))));
    }

    #[test]
    fn test_leaf_count_ceiling() {
        use crate::bvh::MAX_LEAVES;
        assert!(GeometryStore::check_leaf_count("x", MAX_LEAVES).is_ok());
        let r = GeometryStore::check_leaf_count("x", MAX_LEAVES + 1);
        assert!(matches!(r, Err(Error::PayloadTooLarge { limit, .. }) if limit == MAX_LEAVES));
    }

    #[test]
    fn test_bad_value_width_rejected() {
        let mut store = GeometryStore::default();
        let (mut header, nodes, values) = sphere_sbs(2, 2, 2, 0.6);
        header.bytes_per_value = 3;
        let r = store.add_sdf_sbs(header, &nodes, &values, true);
        assert!(matches!(r, Err(Error::BadValueWidth(3))));
    }

    #[test]
    fn test_stats_track_arenas() {
        let mut store = GeometryStore::default();
        let (v, i) = unit_cube_mesh();
        store.add_triangles(&v, &i).unwrap();
        store.add_sdf_svs(&sphere_svs(8, 0.7)).unwrap();

        let s = store.stats();
        assert_eq!(s.geom_count, 2);
        assert_eq!(s.triangles, 12);
        assert_eq!(s.svs_nodes, store.svs_nodes.len());
        assert!(s.blas_pairs > 0);

        store.clear();
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn test_mesh_append_fixup() {
        let mut store = GeometryStore::default();
        let (v, i) = unit_cube_mesh();
        let a = store.add_triangles(&v, &i).unwrap();
        let b = store.add_triangles(&v, &i).unwrap();
        assert_eq!((a, b), (0, 1));

        let gb = store.geom_data[b as usize];
        assert_eq!(gb.offset, [36, 8]);
        // second mesh's indices address its own vertex block
        for k in 0..36 {
            let idx = store.indices[gb.offset[0] as usize + k];
            assert!((8..16).contains(&idx));
        }
        // two BLAS arrays, 11 pairs each
        assert_eq!(store.nodes.len(), 22);
        assert_eq!(store.geom_data[b as usize].bvh_offset, 11);
    }

    #[test]
    fn test_octree_offset_fixup() {
        let mut store = GeometryStore::default();
        let nodes = sphere_octree(3, 0.6);
        store.add_sdf_octree(&nodes).unwrap();
        store.add_sdf_octree(&nodes).unwrap();

        let root = nodes.len();
        for (i, n) in store.octree_nodes[root..].iter().enumerate() {
            if n.offset != 0 {
                // children stay within the second copy's block
                assert!(n.offset as usize >= root, "node {i}");
                assert!((n.offset as usize + 8) <= 2 * root);
            }
        }
        // field evaluates identically through the relocated copy
        let p = Vec3::new(0.3, 0.2, 0.1);
        let a = store.eval_distance(0, p).unwrap().unwrap();
        let b = store.eval_distance(1, p).unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_grid_round_trip() {
        let mut store = GeometryStore::default();
        let (size, data) = sphere_grid(16, 0.5);
        let id = store.add_sdf_grid(size, &data).unwrap();
        let g = store.geom_data[id as usize];
        assert_eq!(g.kind(), GeomType::SdfGrid);
        let d = store.eval_distance(id, Vec3::ZERO).unwrap().unwrap();
        assert!((d + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sparse_sdf_bounds_are_unit_cube() {
        let mut store = GeometryStore::default();
        let svs = store.add_sdf_svs(&sphere_svs(32, 0.7)).unwrap();
        let (header, nodes, values) = sphere_sbs(4, 4, 2, 0.6);
        let sbs = store.add_sdf_sbs(header, &nodes, &values, false).unwrap();
        let (hp_nodes, hp_data) = sphere_hp(4, 0.6);
        let hp = store.add_sdf_hp_octree(&hp_nodes, &hp_data).unwrap();

        // leaves cover only the surface but the field's domain is [-1,1]^3
        for id in [svs, sbs, hp] {
            let b = store.geom_data[id as usize].bounds();
            assert_eq!(b.min, Vec3::splat(-1.0));
            assert_eq!(b.max, Vec3::ONE);
        }
    }

    #[test]
    fn test_frame_octree_leaves_recorded() {
        let mut store = GeometryStore::default();
        let nodes = sphere_frame_octree(4, 0.7);
        let id = store.add_sdf_frame_octree(&nodes).unwrap();
        let g = store.geom_data[id as usize];
        assert_eq!(g.offset[1], 0);
        assert!(!store.frame_leaves.is_empty());
        for leaf in &store.frame_leaves {
            assert!((leaf.node as usize) < store.frame_nodes.len());
        }
    }

    #[test]
    fn test_sbs_modes_share_payload() {
        let mut store = GeometryStore::default();
        let (header, nodes, values) = sphere_sbs(4, 4, 1, 0.6);
        let a = store.add_sdf_sbs(header, &nodes, &values, true).unwrap();
        let b = store.add_sdf_sbs(header, &nodes, &values, false).unwrap();
        assert_eq!(store.geom_data[a as usize].kind(), GeomType::SdfSbsSingleNode);
        assert_eq!(store.geom_data[b as usize].kind(), GeomType::SdfSbs);
        assert!(!store.sbs_remap.is_empty());
        // voxel leaves outnumber brick leaves
        let view_a = store.sbs_view(&store.geom_data[a as usize]);
        assert_eq!(view_a.nodes.len(), nodes.len());
    }

    #[test]
    fn test_clear_keeps_preset() {
        let preset = BuildPreset::from_name("median_fast");
        let mut store = GeometryStore::with_preset(preset);
        store.add_sdf_svs(&sphere_svs(16, 0.5)).unwrap();
        store.clear();
        assert_eq!(store.geom_count(), 0);
        assert!(store.nodes.is_empty());
        assert_eq!(store.build_preset, preset);
    }
}
