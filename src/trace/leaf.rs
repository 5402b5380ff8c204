//! Per-representation leaf intersection, dispatched from the BLAS walk.
//!
//! Cell-based SDF representations (frame octree, SVS, SBS, hp cells) all
//! funnel into one routine that clips the ray to the cell, hands the
//! eight corner values to the configured solver and converts the
//! cell-space root back to the ray parameter.

use crate::core::types::{Mat3, UVec3, Vec3};
use crate::geom::hp::HpOctreeView;
use crate::geom::octree::{eval_distance_octree, SdfOctreeNode};
use crate::geom::rf::{RF_CELL_SIZE, SH_C0};
use crate::geom::GeomType;
use crate::math::ray::{ray_box_interval, safe_inverse};
use crate::math::Aabb;
use crate::scene::store::GeomData;
use crate::scene::Scene;
use crate::trace::solver;
use crate::trace::traverse::Hit;

/// Rays are pushed off SDF surfaces by this much before re-entry tests
const SDF_BIAS: f32 = 0.1;

const MT_EPS: f32 = 1e-8;

impl Scene {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn intersect_leaf(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        count: u32,
        hit: &mut Hit,
    ) {
        let t_near_sdf = t_near.max(SDF_BIAS);
        match geom.kind() {
            GeomType::TriangleMesh => {
                self.intersect_triangles(geom, ray_pos, ray_dir, t_near, inst_id, geom_id, start, count, hit)
            }
            GeomType::SdfGrid => {
                self.intersect_grid(geom, ray_pos, ray_dir, t_near_sdf, inst_id, geom_id, start, hit)
            }
            GeomType::SdfOctree => {
                self.intersect_octree(geom, ray_pos, ray_dir, t_near_sdf, inst_id, geom_id, start, hit)
            }
            GeomType::SdfFrameOctree => {
                let leaf = self.geom.frame_leaves[(geom.offset[1] + start) as usize];
                let node = &self.geom.frame_nodes[(geom.offset[0] + leaf.node) as usize];
                let bb = Aabb::new(leaf.min, leaf.min + Vec3::splat(leaf.size));
                self.intersect_cell(
                    ray_pos, ray_dir, t_near_sdf, bb, &node.values, start, inst_id, geom_id,
                    Vec3::ONE, hit,
                );
            }
            GeomType::SdfSvs => {
                let node = &self.geom.svs_nodes[(geom.offset[0] + start) as usize];
                self.intersect_cell(
                    ray_pos, ray_dir, t_near_sdf, node.cell_box(), &node.corners(), start,
                    inst_id, geom_id, Vec3::ONE, hit,
                );
            }
            GeomType::SdfSbs => {
                self.intersect_sbs_voxel(geom, ray_pos, ray_dir, t_near_sdf, inst_id, geom_id, start, hit)
            }
            GeomType::SdfSbsSingleNode => {
                self.intersect_sbs_brick(geom, ray_pos, ray_dir, t_near_sdf, inst_id, geom_id, start, hit)
            }
            GeomType::SdfHpOctree => {
                let node_offset = self.geom.hp_node_offsets[geom.offset[0] as usize];
                let node = &self.geom.hp_nodes[(node_offset + start) as usize];
                let view = HpOctreeView { nodes: &self.geom.hp_nodes, data: &self.geom.hp_data };
                self.intersect_cell(
                    ray_pos, ray_dir, t_near_sdf, node.cell_box(), &view.cell_corners(node),
                    start, inst_id, geom_id, Vec3::ONE, hit,
                );
            }
            GeomType::RfGrid => {
                self.intersect_rf(geom, ray_pos, ray_dir, t_near, inst_id, geom_id, start, hit)
            }
            GeomType::GaussianSplats => {
                self.intersect_gs(geom, ray_pos, ray_dir, t_near, inst_id, geom_id, start, hit)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn intersect_triangles(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        count: u32,
        hit: &mut Hit,
    ) {
        let index_offset = geom.offset[0] as usize;
        for prim in start..start + count {
            let i = index_offset + 3 * prim as usize;
            let a = self.geom.vertices[self.geom.indices[i] as usize].truncate();
            let b = self.geom.vertices[self.geom.indices[i + 1] as usize].truncate();
            let c = self.geom.vertices[self.geom.indices[i + 2] as usize].truncate();

            let e1 = b - a;
            let e2 = c - a;
            let pvec = ray_dir.cross(e2);
            let det = e1.dot(pvec);
            if det.abs() < MT_EPS {
                continue;
            }
            let inv_det = 1.0 / det;
            let tvec = ray_pos - a;
            let u = tvec.dot(pvec) * inv_det;
            if !(0.0..=1.0).contains(&u) {
                continue;
            }
            let qvec = tvec.cross(e1);
            let v = ray_dir.dot(qvec) * inv_det;
            if v < 0.0 || u + v > 1.0 {
                continue;
            }
            let t = e2.dot(qvec) * inv_det;
            if t >= t_near && t < hit.t {
                let mut n = e1.cross(e2);
                if n.dot(ray_dir) > 0.0 {
                    n = -n;
                }
                hit.t = t;
                hit.prim_id = prim;
                hit.inst_id = inst_id;
                hit.geom_id = geom_id;
                hit.normal = n.normalize_or(Vec3::X);
                hit.color = Vec3::ONE;
            }
        }
    }

    /// Sphere trace the whole grid field within one half-domain leaf
    #[allow(clippy::too_many_arguments)]
    fn intersect_grid(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        hit: &mut Hit,
    ) {
        let view = self.geom.grid_view(geom);
        let bb = crate::scene::extract::domain_halves()[start as usize];
        let Some(t) = self.field_sphere_trace(ray_pos, ray_dir, t_near, bb, hit.t, |p| {
            view.eval_distance(p)
        }) else {
            return;
        };

        let p = ray_pos + t * ray_dir;
        let cell = view.cell_of(p);
        let (cmin, cmax) = view.cell_box(cell);
        let frac = ((p - cmin) / (cmax - cmin)).clamp(Vec3::ZERO, Vec3::ONE);
        let corners = view.cell_corners(cell);
        hit.t = t;
        hit.prim_id = start;
        hit.inst_id = inst_id;
        hit.geom_id = geom_id;
        hit.normal = solver::trilinear_grad(&corners, frac).normalize_or(Vec3::X);
        hit.color = Vec3::ONE;
    }

    #[allow(clippy::too_many_arguments)]
    fn intersect_octree(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        hit: &mut Hit,
    ) {
        let nodes = &self.geom.octree_nodes;
        let root = geom.offset[0] as usize;
        let bb = crate::scene::extract::domain_halves()[start as usize];
        let Some(t) = self.field_sphere_trace(ray_pos, ray_dir, t_near, bb, hit.t, |p| {
            eval_distance_octree(nodes, root, p)
        }) else {
            return;
        };

        let p = ray_pos + t * ray_dir;
        let (cmin, csize) = octree_leaf_cell(nodes, root, p);
        let corners: [f32; 8] = std::array::from_fn(|i| {
            let off = Vec3::new((i >> 2 & 1) as f32, (i >> 1 & 1) as f32, (i & 1) as f32);
            eval_distance_octree(nodes, root, (cmin + off * csize).clamp(Vec3::splat(-0.999), Vec3::splat(0.999)))
        });
        let frac = ((p - cmin) / csize).clamp(Vec3::ZERO, Vec3::ONE);
        hit.t = t;
        hit.prim_id = start;
        hit.inst_id = inst_id;
        hit.geom_id = geom_id;
        hit.normal = solver::trilinear_grad(&corners, frac).normalize_or(Vec3::X);
        hit.color = Vec3::ONE;
    }

    /// March a distance field inside `bb` down to `field_eps`, returning
    /// the ray parameter of the surface or None
    fn field_sphere_trace(
        &self,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        bb: Aabb,
        t_best: f32,
        field: impl Fn(Vec3) -> f32,
    ) -> Option<f32> {
        let (t0, t1) = ray_box_interval(ray_pos, safe_inverse(ray_dir), bb.min, bb.max);
        if t0 > t1 || t1 <= t_near {
            return None;
        }
        let dir_len = ray_dir.length();
        let eps = self.trace.field_eps;
        let mut t = t0.max(t_near);
        let mut iter = 0;
        let mut dist = field(ray_pos + t * ray_dir);
        while t <= t1 && dist > eps && iter < self.trace.st_max_iters {
            t += dist / dir_len;
            dist = field(ray_pos + t * ray_dir);
            iter += 1;
        }
        (dist <= eps && t <= t1 && t < t_best).then_some(t)
    }

    #[allow(clippy::too_many_arguments)]
    fn intersect_sbs_voxel(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        hit: &mut Hit,
    ) {
        let sbs_id = geom.offset[0] as usize;
        let view = self.geom.sbs_view(geom);
        let remap_offset = self.geom.sbs_remap_offsets[sbs_id];
        let [node_local, voxel] = self.geom.sbs_remap[(remap_offset + start) as usize];
        let node = &view.nodes[node_local as usize];
        let bs = view.header.brick_size;
        let v = UVec3::new(voxel % bs, (voxel / bs) % bs, voxel / (bs * bs));
        self.intersect_cell(
            ray_pos,
            ray_dir,
            t_near,
            view.voxel_box(node, v),
            &view.voxel_corners(node, v),
            start,
            inst_id,
            geom_id,
            Vec3::ONE,
            hit,
        );
    }

    /// Walk the voxels of one brick front to back, solving inside each
    /// voxel whose corner band reaches zero
    #[allow(clippy::too_many_arguments)]
    fn intersect_sbs_brick(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        hit: &mut Hit,
    ) {
        let view = self.geom.sbs_view(geom);
        let node = &view.nodes[start as usize];
        let brick = node.brick_box();
        let bs = view.header.brick_size as f32;
        let voxel = view.voxel_size(node);
        let inv_dir = safe_inverse(ray_dir);

        let (b0, b1) = ray_box_interval(ray_pos, inv_dir, brick.min, brick.max);
        if b0 > b1 || b1 <= t_near {
            return;
        }
        let mut t_cursor = b0.max(t_near);
        while t_cursor < b1 && t_cursor < hit.t {
            let p = ray_pos + t_cursor * ray_dir;
            let local = ((p - brick.min) / voxel).clamp(Vec3::splat(1e-6), Vec3::splat(bs - 1e-6));
            let vf = local.floor();
            let v = UVec3::new(vf.x as u32, vf.y as u32, vf.z as u32);

            let cell = view.voxel_box(node, v);
            let (c0, c1) = ray_box_interval(ray_pos, inv_dir, cell.min, cell.max);
            if view.voxel_on_surface(node, v) {
                self.intersect_cell(
                    ray_pos,
                    ray_dir,
                    t_near,
                    cell,
                    &view.voxel_corners(node, v),
                    start,
                    inst_id,
                    geom_id,
                    Vec3::ONE,
                    hit,
                );
            }
            // advance past this voxel's exit
            t_cursor += (c1 - t_cursor).max(0.0) + 1e-6;
        }
    }

    /// March the interpolated density of one occupied radiance-field cell
    /// until it reaches the preset threshold
    #[allow(clippy::too_many_arguments)]
    fn intersect_rf(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        hit: &mut Hit,
    ) {
        let rf_id = geom.offset[0] as usize;
        let size = self.geom.rf_sizes[rf_id];
        let scale = self.geom.rf_scales[rf_id];
        let data_off = self.geom.rf_data_offsets[rf_id] as usize;
        let leaf = (self.geom.rf_leaf_offsets[rf_id] + start) as usize;
        let cell = self.geom.rf_cells[leaf];
        let ptrs = &self.geom.rf_ptrs[8 * leaf..8 * leaf + 8];

        let step = 2.0 * scale / size as f32;
        let min = Vec3::new(cell.x as f32, cell.y as f32, cell.z as f32) * step
            - Vec3::splat(scale);
        let bb = Aabb::new(min, min + Vec3::splat(step));

        let densities: [f32; 8] =
            std::array::from_fn(|i| self.geom.rf_data[data_off + ptrs[i] as usize]);
        let colors: [Vec3; 8] = std::array::from_fn(|i| {
            let block = &self.geom.rf_data
                [data_off + ptrs[i] as usize..data_off + ptrs[i] as usize + RF_CELL_SIZE];
            let decode = |v: f32| (SH_C0 * v + 0.5).clamp(0.0, 1.0);
            Vec3::new(decode(block[1]), decode(block[10]), decode(block[19]))
        });

        let (t0, t1) = ray_box_interval(ray_pos, safe_inverse(ray_dir), bb.min, bb.max);
        if t0 > t1 || t1 <= t_near {
            return;
        }
        const MARCH_STEPS: u32 = 32;
        let entry = t0.max(t_near);
        let dt = (t1 - entry) / MARCH_STEPS as f32;
        for i in 0..=MARCH_STEPS {
            let t = entry + dt * i as f32;
            let p = ray_pos + t * ray_dir;
            let frac = ((p - bb.min) / step).clamp(Vec3::ZERO, Vec3::ONE);
            let dens = solver::eval_dist_trilinear(&densities, frac);
            if dens >= self.trace.rf_density_threshold && t < hit.t {
                hit.t = t;
                hit.prim_id = start;
                hit.inst_id = inst_id;
                hit.geom_id = geom_id;
                // density rises into the medium, so the surface faces
                // against its gradient
                hit.normal =
                    (-solver::trilinear_grad(&densities, frac)).normalize_or(-ray_dir.normalize_or(Vec3::X));
                hit.color = solver::eval_color_trilinear(&colors, frac);
                return;
            }
        }
    }

    /// Solid 3-sigma ellipsoid hit against one splat's conic
    #[allow(clippy::too_many_arguments)]
    fn intersect_gs(
        &self,
        geom: &GeomData,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        geom_id: u32,
        start: u32,
        hit: &mut Hit,
    ) {
        let idx = (geom.offset[0] + start) as usize;
        let splat = &self.geom.gs_splats[idx];
        let cols = self.geom.gs_conics[idx];
        let conic = Mat3::from_cols(cols[0], cols[1], cols[2]);

        let o = ray_pos - splat.position;
        let ad = conic * ray_dir;
        let a = ray_dir.dot(ad);
        let b = 2.0 * o.dot(ad);
        let c = o.dot(conic * o) - 9.0;
        if a.abs() < 1e-12 {
            return;
        }
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return;
        }
        let sq = disc.sqrt();
        let r0 = (-b - sq) / (2.0 * a);
        let r1 = (-b + sq) / (2.0 * a);
        let t = if r0 >= t_near { r0 } else { r1 };
        if t >= t_near && t < hit.t {
            let p = ray_pos + t * ray_dir;
            hit.t = t;
            hit.prim_id = start;
            hit.inst_id = inst_id;
            hit.geom_id = geom_id;
            hit.normal = (conic * (p - splat.position)).normalize_or(Vec3::X);
            hit.color = splat.color;
        }
    }

    /// Clip the ray to `bb`, run the configured solver on the trilinear
    /// corners and record the hit if it improves on the current one
    #[allow(clippy::too_many_arguments)]
    fn intersect_cell(
        &self,
        ray_pos: Vec3,
        ray_dir: Vec3,
        t_near: f32,
        bb: Aabb,
        values: &[f32; 8],
        prim_id: u32,
        inst_id: u32,
        geom_id: u32,
        color: Vec3,
        hit: &mut Hit,
    ) {
        let (t0, t1) = ray_box_interval(ray_pos, safe_inverse(ray_dir), bb.min, bb.max);
        if t0 > t1 || t1 <= t_near {
            return;
        }
        let d = bb.size().x;
        let entry = t0.max(t_near);
        let start_q = ((ray_pos + entry * ray_dir - bb.min) / d).clamp(Vec3::ZERO, Vec3::ONE);
        let q_far = (t1 - entry) / d;

        let Some(t) =
            solver::local_surface_intersection(&self.trace, ray_dir, values, d, q_far, start_q)
        else {
            return;
        };
        let t_real = entry + d * t;
        if t_real >= t_near && t_real < hit.t {
            let q = (start_q + t * ray_dir).clamp(Vec3::ZERO, Vec3::ONE);
            hit.t = t_real;
            hit.prim_id = prim_id;
            hit.inst_id = inst_id;
            hit.geom_id = geom_id;
            hit.normal = solver::trilinear_grad(values, q).normalize_or(Vec3::X);
            hit.color = color;
        }
    }
}

/// Leaf cell of a scalar octree containing `pos`, as (min, size) in the
/// [-1,1]^3 domain
fn octree_leaf_cell(nodes: &[SdfOctreeNode], root: usize, pos: Vec3) -> (Vec3, f32) {
    let mut idx = root;
    let mut min = Vec3::splat(-1.0);
    let mut size = 2.0f32;
    let mut local = pos;
    while nodes[idx].offset != 0 {
        let gx = (local.x >= 0.0) as usize;
        let gy = (local.y >= 0.0) as usize;
        let gz = (local.z >= 0.0) as usize;
        let child = (gx << 2) | (gy << 1) | gz;
        size *= 0.5;
        min += Vec3::new(gx as f32, gy as f32, gz as f32) * size;
        let shift = Vec3::new(gx as f32, gy as f32, gz as f32) - Vec3::splat(0.5);
        local = 2.0 * (local - shift);
        idx = nodes[idx].offset as usize + child;
    }
    (min, size)
}
