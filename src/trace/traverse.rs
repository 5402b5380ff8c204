//! Two-level ray traversal: a stackless escape-threaded walk over the
//! TLAS, and a fixed-stack sibling-pair walk over each instance's BLAS.

use crate::bvh::{extract_count, extract_start, ESCAPE_END, LEAF_BIT};
use crate::core::types::{Mat3, Vec3, Vec4};
use crate::math::ray::{ray_box_interval, safe_inverse};
use crate::scene::Scene;

pub const INVALID_ID: u32 = u32::MAX;

/// BLAS traversal stack depth; enough for any tree the pair builder
/// produces from payloads under the size ceiling
pub const STACK_SIZE: usize = 80;

#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub t: f32,
    pub prim_id: u32,
    pub inst_id: u32,
    pub geom_id: u32,
    /// Instance-space normal during traversal, world-space on return
    pub normal: Vec3,
    pub color: Vec3,
}

impl Hit {
    pub fn none(far: f32) -> Hit {
        Hit {
            t: far,
            prim_id: INVALID_ID,
            inst_id: INVALID_ID,
            geom_id: INVALID_ID,
            normal: Vec3::X,
            color: Vec3::ZERO,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.inst_id != INVALID_ID
    }
}

impl Scene {
    /// Closest hit along a ray.
    ///
    /// `pos_and_near` packs the origin with tNear, `dir_and_far` the
    /// direction with tFar; a negative tFar requests any-hit semantics,
    /// stopping at the first accepted intersection.
    pub fn ray_query_nearest_hit(&self, pos_and_near: Vec4, dir_and_far: Vec4) -> Hit {
        debug_assert!(self.committed(), "ray query against an uncommitted scene");

        let stop_on_first = dir_and_far.w <= 0.0;
        let far = dir_and_far.w.abs();
        let ray_pos = pos_and_near.truncate();
        let t_near = pos_and_near.w;
        let ray_dir = dir_and_far.truncate();
        let inv_dir = safe_inverse(ray_dir);

        let mut hit = Hit::none(far);
        let mut node_idx = 0u32;
        while node_idx != ESCAPE_END {
            let node = &self.tlas[node_idx as usize];
            let (t0, t1) = ray_box_interval(ray_pos, inv_dir, node.box_min, node.box_max);
            let intersects = t0 <= t1 && t1 > t_near && t0 < hit.t;

            if node.is_leaf() {
                if intersects {
                    let inst_id = extract_start(node.left_offset);
                    self.traverse_instance(ray_pos, ray_dir, t_near, inst_id, stop_on_first, &mut hit);
                    if stop_on_first && hit.is_hit() {
                        break;
                    }
                }
                node_idx = node.escape_index;
            } else {
                node_idx = if intersects { node.left_offset } else { node.escape_index };
            }
        }

        if hit.is_hit() {
            let inst = &self.instances[hit.inst_id as usize];
            let m = Mat3::from_mat4(inst.transform_inv_transposed);
            hit.normal = (m * hit.normal).normalize_or(Vec3::X);
        }
        hit
    }

    /// Any-hit query: true when anything lies in (tNear, tFar)
    pub fn ray_query_any_hit(&self, pos_and_near: Vec4, dir_and_far: Vec4) -> bool {
        let flipped = Vec4::new(
            dir_and_far.x,
            dir_and_far.y,
            dir_and_far.z,
            -dir_and_far.w.abs(),
        );
        self.ray_query_nearest_hit(pos_and_near, flipped).is_hit()
    }

    fn traverse_instance(
        &self,
        world_pos: Vec3,
        world_dir: Vec3,
        t_near: f32,
        inst_id: u32,
        stop_on_first: bool,
        hit: &mut Hit,
    ) {
        let inst = &self.instances[inst_id as usize];
        let ray_pos = inst.transform_inv.transform_point3(world_pos);
        // unnormalized on purpose: t then measures the same parameter in
        // both spaces, so hits compare directly across instances
        let ray_dir = Mat3::from_mat4(inst.transform_inv) * world_dir;
        let inv_dir = safe_inverse(ray_dir);

        let geom = &self.geom.geom_data[inst.geom_id as usize];
        let bvh_offset = geom.bvh_offset as usize;

        let mut stack = [0u32; STACK_SIZE];
        let mut top: i32 = 0;
        let mut left_offset = 0u32;

        while top >= 0 {
            // descend until a leaf or a dead subtree
            while top >= 0 && left_offset & LEAF_BIT == 0 {
                let pair = &self.geom.nodes[bvh_offset + left_offset as usize];
                let (l0, l1) =
                    ray_box_interval(ray_pos, inv_dir, pair.left.box_min, pair.left.box_max);
                let (r0, r1) =
                    ray_box_interval(ray_pos, inv_dir, pair.right.box_min, pair.right.box_max);
                let hit_left = l0 <= l1 && l1 >= t_near && l0 <= hit.t;
                let hit_right = r0 <= r1 && r1 >= t_near && r0 <= hit.t;

                if hit_left && hit_right {
                    let (near, far) = if l0 <= r0 {
                        (pair.left.left_offset, pair.right.left_offset)
                    } else {
                        (pair.right.left_offset, pair.left.left_offset)
                    };
                    left_offset = near;
                    debug_assert!((top as usize) < STACK_SIZE);
                    stack[top as usize] = far;
                    top += 1;
                } else if hit_left {
                    left_offset = pair.left.left_offset;
                } else if hit_right {
                    left_offset = pair.right.left_offset;
                } else {
                    top -= 1;
                    left_offset = stack[top.max(0) as usize];
                }
            }

            if top >= 0 {
                let start = extract_start(left_offset);
                let count = extract_count(left_offset);
                self.intersect_leaf(
                    geom, ray_pos, ray_dir, t_near, inst_id, inst.geom_id, start, count, hit,
                );
                if stop_on_first && hit.is_hit() {
                    return;
                }
            }
            top -= 1;
            left_offset = stack[top.max(0) as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Mat4, Quat, Vec4};
    use crate::geom::grid::sphere_grid;
    use crate::geom::hp::sphere_hp;
    use crate::geom::mesh::unit_cube_mesh;
    use crate::geom::octree::{sphere_frame_octree, sphere_octree};
    use crate::geom::rf::sphere_rf;
    use crate::geom::sbs::sphere_sbs;
    use crate::geom::splat::GsSplat;
    use crate::geom::svs::sphere_svs;
    use crate::scene::{RfPackMode, Scene};
    use crate::trace::preset::SolverKind;

    fn ray(pos: Vec3, dir: Vec3, far: f32) -> (Vec4, Vec4) {
        (pos.extend(0.0), dir.extend(far))
    }

    fn committed(mut scene: Scene) -> Scene {
        scene.commit().unwrap();
        scene
    }

    fn cube_scene() -> Scene {
        let mut scene = Scene::default();
        let (v, i) = unit_cube_mesh();
        let geom = scene.geom.add_triangles(&v, &i).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        committed(scene)
    }

    #[test]
    fn test_cube_front_face() {
        let scene = cube_scene();
        let (p, d) = ray(Vec3::new(0.1, -0.2, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert!(hit.is_hit());
        assert!((hit.t - 2.5).abs() < 1e-5);
        assert!((hit.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
        assert_eq!(hit.inst_id, 0);
        assert_eq!(hit.geom_id, 0);
        assert!(hit.prim_id < 12);

        // restarting just past the front face yields the back face, and
        // past that the ray leaves the cube
        let (p2, d2) = ray(Vec3::new(0.1, -0.2, -3.0 + hit.t + 1e-4), Vec3::Z, 100.0);
        let back = scene.ray_query_nearest_hit(p2, d2);
        assert!(back.is_hit());
        assert!((hit.t + back.t + 1e-4 - 3.5).abs() < 1e-4);
        // normals face the ray origin, so the back face also reports -Z
        assert!((back.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
        let (p3, d3) = ray(Vec3::new(0.1, -0.2, -3.0 + 3.5 + 1e-3), Vec3::Z, 100.0);
        assert!(!scene.ray_query_nearest_hit(p3, d3).is_hit());
    }

    #[test]
    fn test_cube_miss() {
        let scene = cube_scene();
        let (p, d) = ray(Vec3::new(2.0, 2.0, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert!(!hit.is_hit());
        assert_eq!(hit.t, 100.0);
    }

    #[test]
    fn test_far_clip_respected() {
        let scene = cube_scene();
        let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 2.0);
        assert!(!scene.ray_query_nearest_hit(p, d).is_hit());
    }

    #[test]
    fn test_any_hit_wrapper() {
        let scene = cube_scene();
        let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 100.0);
        assert!(scene.ray_query_any_hit(p, d));
        let (p, d) = ray(Vec3::new(2.0, 2.0, -3.0), Vec3::Z, 100.0);
        assert!(!scene.ray_query_any_hit(p, d));
    }

    #[test]
    fn test_translated_instance() {
        let mut scene = Scene::default();
        let (v, i) = unit_cube_mesh();
        let geom = scene.geom.add_triangles(&v, &i).unwrap();
        scene.add_instance(geom, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        let scene = committed(scene);

        let (p, d) = ray(Vec3::new(5.0, 0.0, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert!(hit.is_hit());
        assert!((hit.t - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_scaled_instance_t_in_world_units() {
        let mut scene = Scene::default();
        let (v, i) = unit_cube_mesh();
        let geom = scene.geom.add_triangles(&v, &i).unwrap();
        scene.add_instance(geom, Mat4::from_scale(Vec3::splat(2.0))).unwrap();
        let scene = committed(scene);

        // cube now spans [-1,1], front face at z=-1
        let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert!(hit.is_hit());
        assert!((hit.t - 2.0).abs() < 1e-5, "t={}", hit.t);
        assert!((hit.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn test_nearest_of_two_instances() {
        let mut scene = Scene::default();
        let (v, i) = unit_cube_mesh();
        let geom = scene.geom.add_triangles(&v, &i).unwrap();
        let near = scene.add_instance(geom, Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))).unwrap();
        let far = scene.add_instance(geom, Mat4::from_translation(Vec3::new(0.0, 0.0, 6.0))).unwrap();
        let scene = committed(scene);

        let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert_eq!(hit.inst_id, near);
        assert!((hit.t - 4.5).abs() < 1e-5);
        assert_ne!(hit.inst_id, far);
    }

    #[test]
    fn test_bvh_agrees_with_brute_force() {
        let mut scene = Scene::default();
        let (v, i) = unit_cube_mesh();
        let geom = scene.geom.add_triangles(&v, &i).unwrap();
        let m = Mat4::from_rotation_y(0.6) * Mat4::from_rotation_x(0.3);
        scene.add_instance(geom, m).unwrap();
        let scene = committed(scene);

        for iy in -2..=2 {
            for ix in -2..=2 {
                let origin = Vec3::new(ix as f32 * 0.25, iy as f32 * 0.25, -3.0);
                let (p, d) = ray(origin, Vec3::Z, 100.0);
                let hit = scene.ray_query_nearest_hit(p, d);

                // brute force in instance space
                let inv = scene.instances[0].transform_inv;
                let lp = inv.transform_point3(origin);
                let ld = Mat3::from_mat4(inv) * Vec3::Z;
                let mut best = f32::INFINITY;
                for tri in 0..12 {
                    let a = v[i[3 * tri] as usize].truncate();
                    let b = v[i[3 * tri + 1] as usize].truncate();
                    let c = v[i[3 * tri + 2] as usize].truncate();
                    let e1 = b - a;
                    let e2 = c - a;
                    let pv = ld.cross(e2);
                    let det = e1.dot(pv);
                    if det.abs() < 1e-8 {
                        continue;
                    }
                    let tv = lp - a;
                    let u = tv.dot(pv) / det;
                    let qv = tv.cross(e1);
                    let w = ld.dot(qv) / det;
                    if (0.0..=1.0).contains(&u) && w >= 0.0 && u + w <= 1.0 {
                        let t = e2.dot(qv) / det;
                        if t > 0.0 {
                            best = best.min(t);
                        }
                    }
                }
                if best.is_finite() {
                    assert!(hit.is_hit(), "({ix},{iy})");
                    assert!((hit.t - best).abs() < 1e-4, "({ix},{iy}): {} vs {best}", hit.t);
                } else {
                    assert!(!hit.is_hit(), "({ix},{iy})");
                }
            }
        }
    }

    fn sphere_hit_t(scene: &Scene, radius: f32, tol: f32, what: &str) {
        let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert!(hit.is_hit(), "{what}: missed");
        let expect = 3.0 - radius;
        assert!((hit.t - expect).abs() < tol, "{what}: t={} expect {expect}", hit.t);
        // surface normal of the sphere points back along the ray here
        assert!(hit.normal.dot(Vec3::Z) < 0.0, "{what}: normal {:?}", hit.normal);
    }

    #[test]
    fn test_sdf_grid_sphere() {
        let mut scene = Scene::default();
        let (size, data) = sphere_grid(64, 0.7);
        let geom = scene.geom.add_sdf_grid(size, &data).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        let scene = committed(scene);
        sphere_hit_t(&scene, 0.7, 0.02, "grid");
    }

    #[test]
    fn test_sdf_octree_sphere() {
        let mut scene = Scene::default();
        let geom = scene.geom.add_sdf_octree(&sphere_octree(6, 0.7)).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        let scene = committed(scene);
        // piecewise-constant samples cap the accuracy at the cell size
        sphere_hit_t(&scene, 0.7, 0.1, "octree");
    }

    #[test]
    fn test_frame_octree_sphere() {
        let mut scene = Scene::default();
        let geom = scene.geom.add_sdf_frame_octree(&sphere_frame_octree(5, 0.7)).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        let scene = committed(scene);
        sphere_hit_t(&scene, 0.7, 0.02, "frame octree");
    }

    #[test]
    fn test_svs_sphere_all_solvers() {
        let mut scene = Scene::default();
        let geom = scene.geom.add_sdf_svs(&sphere_svs(64, 0.7)).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        let mut scene = committed(scene);

        for solver in [
            SolverKind::SphereTracing,
            SolverKind::IntervalTracing,
            SolverKind::Analytic,
            SolverKind::Newton,
        ] {
            scene.trace.solver = solver;
            // quantized corners bound the error by about one voxel band
            sphere_hit_t(&scene, 0.7, 0.06, &format!("svs/{solver:?}"));
        }
    }

    #[test]
    fn test_sbs_sphere_both_modes() {
        for single_node in [true, false] {
            let mut scene = Scene::default();
            let (header, nodes, values) = sphere_sbs(8, 8, 2, 0.7);
            let geom = scene.geom.add_sdf_sbs(header, &nodes, &values, single_node).unwrap();
            scene.add_instance(geom, Mat4::IDENTITY).unwrap();
            let scene = committed(scene);
            sphere_hit_t(&scene, 0.7, 0.05, &format!("sbs single_node={single_node}"));
        }
    }

    #[test]
    fn test_hp_octree_sphere() {
        let mut scene = Scene::default();
        let (nodes, data) = sphere_hp(32, 0.7);
        let geom = scene.geom.add_sdf_hp_octree(&nodes, &data).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        let scene = committed(scene);
        sphere_hit_t(&scene, 0.7, 0.02, "hp octree");
    }

    #[test]
    fn test_rf_sphere_both_packings() {
        for mode in [RfPackMode::Fast, RfPackMode::Compact] {
            let mut scene = Scene::default();
            let data = sphere_rf(32, 0.7, Vec3::new(0.9, 0.1, 0.1));
            let geom = scene.geom.add_rf_grid(32, 1.0, &data, mode).unwrap();
            scene.add_instance(geom, Mat4::IDENTITY).unwrap();
            let scene = committed(scene);

            let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 100.0);
            let hit = scene.ray_query_nearest_hit(p, d);
            assert!(hit.is_hit(), "{mode:?}");
            // density is cell-resolution occupancy, tolerance is coarse
            assert!((hit.t - 2.3).abs() < 0.15, "{mode:?}: t={}", hit.t);
            assert!(hit.color.x > 0.5, "{mode:?}: color {:?}", hit.color);
        }
    }

    #[test]
    fn test_gs_splat_ellipsoid() {
        let mut scene = Scene::default();
        let splat = GsSplat::new(
            Vec3::ZERO,
            Vec3::splat(0.1),
            Quat::IDENTITY,
            1.0,
            Vec3::new(0.2, 0.9, 0.4),
        );
        let geom = scene.geom.add_gs_splats(&[splat]).unwrap();
        scene.add_instance(geom, Mat4::IDENTITY).unwrap();
        let scene = committed(scene);

        let (p, d) = ray(Vec3::new(0.0, 0.0, -3.0), Vec3::Z, 100.0);
        let hit = scene.ray_query_nearest_hit(p, d);
        assert!(hit.is_hit());
        // 3-sigma shell of an isotropic 0.1 splat sits at radius 0.3
        assert!((hit.t - 2.7).abs() < 1e-3, "t={}", hit.t);
        assert!((hit.color - Vec3::new(0.2, 0.9, 0.4)).length() < 1e-6);
        assert!(hit.normal.dot(Vec3::Z) < 0.0);
    }

    #[test]
    fn test_thousand_instances_report_own_id() {
        let mut scene = Scene::default();
        let v = vec![
            Vec4::new(-0.5, -0.5, 0.0, 1.0),
            Vec4::new(0.5, -0.5, 0.0, 1.0),
            Vec4::new(0.0, 0.5, 0.0, 1.0),
        ];
        let idx = vec![0u32, 1, 2];
        let geom = scene.geom.add_triangles(&v, &idx).unwrap();
        let center_of = |k: u32| {
            Vec3::new(
                (k % 10) as f32 * 3.0,
                ((k / 10) % 10) as f32 * 3.0,
                (k / 100) as f32 * 3.0,
            )
        };
        for k in 0..1000 {
            scene.add_instance(geom, Mat4::from_translation(center_of(k))).unwrap();
        }
        let scene = committed(scene);

        for k in (0..1000).step_by(37) {
            let origin = center_of(k) - Vec3::new(0.0, 0.0, 2.0);
            let (p, d) = ray(origin, Vec3::Z, 3.0);
            let hit = scene.ray_query_nearest_hit(p, d);
            assert!(hit.is_hit(), "instance {k}");
            assert_eq!(hit.inst_id, k, "instance {k}");
            assert_eq!(hit.prim_id, 0);
            assert!((hit.t - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_replay_bit_identical() {
        let build = || {
            let mut scene = Scene::default();
            let geom = scene.geom.add_sdf_svs(&sphere_svs(32, 0.6)).unwrap();
            scene.add_instance(geom, Mat4::from_rotation_y(0.4)).unwrap();
            let (v, i) = unit_cube_mesh();
            let mesh = scene.geom.add_triangles(&v, &i).unwrap();
            scene.add_instance(mesh, Mat4::from_translation(Vec3::new(2.5, 0.0, 0.0))).unwrap();
            committed(scene)
        };
        let a = build();
        let b = build();
        // rebuilt arenas match byte for byte
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(a.geom.geom_data.as_slice()),
            bytemuck::cast_slice::<_, u8>(b.geom.geom_data.as_slice())
        );
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(a.geom.nodes.as_slice()),
            bytemuck::cast_slice::<_, u8>(b.geom.nodes.as_slice())
        );
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(a.tlas.as_slice()),
            bytemuck::cast_slice::<_, u8>(b.tlas.as_slice())
        );
        for k in 0..64u32 {
            let h = k.wrapping_mul(0x9E37_79B9);
            let origin = Vec3::new(
                (h & 0xFF) as f32 / 64.0 - 2.0,
                ((h >> 8) & 0xFF) as f32 / 64.0 - 2.0,
                -3.0,
            );
            let (p, d) = ray(origin, Vec3::Z, 100.0);
            let ha = a.ray_query_nearest_hit(p, d);
            let hb = b.ray_query_nearest_hit(p, d);
            assert_eq!(ha.t.to_bits(), hb.t.to_bits(), "ray {k}");
            assert_eq!(ha.prim_id, hb.prim_id, "ray {k}");
            assert_eq!(ha.inst_id, hb.inst_id, "ray {k}");
        }
    }
}
