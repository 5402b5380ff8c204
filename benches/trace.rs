use criterion::{criterion_group, criterion_main, Criterion, black_box};

use rayon::prelude::*;

use sdfray::bvh::{build_bvh_pairs, BuildPreset};
use sdfray::geom::mesh::unit_cube_mesh;
use sdfray::geom::svs::sphere_svs;
use sdfray::scene::Scene;

use glam::{Mat4, Vec3, Vec4};

fn svs_scene(lod: u32) -> Scene {
    let mut scene = Scene::default();
    let geom = scene.geom.add_sdf_svs(&sphere_svs(lod, 0.7)).unwrap();
    scene.add_instance(geom, Mat4::IDENTITY).unwrap();
    scene.commit().unwrap();
    scene
}

fn bench_blas_build_svs(c: &mut Criterion) {
    let nodes = sphere_svs(128, 0.7);
    let boxes: Vec<_> = nodes.iter().map(|n| n.cell_box()).collect();

    for name in ["median_fast", "sah"] {
        let preset = BuildPreset::from_name(name);
        c.bench_function(&format!("blas_build_svs_128_{name}"), |b| {
            b.iter(|| build_bvh_pairs(black_box(&boxes), preset));
        });
    }
}

fn bench_blas_build_mesh(c: &mut Criterion) {
    let mut scene = Scene::default();
    let (v, i) = unit_cube_mesh();

    c.bench_function("geom_append_cube", |b| {
        b.iter(|| {
            scene.geom.add_triangles(black_box(&v), black_box(&i)).unwrap();
        });
    });
}

fn ray_block(scene: &Scene, n: u32) -> u32 {
    let mut hits = 0;
    for y in 0..n {
        for x in 0..n {
            let origin = Vec3::new(
                2.0 * (x as f32 + 0.5) / n as f32 - 1.0,
                2.0 * (y as f32 + 0.5) / n as f32 - 1.0,
                -3.0,
            );
            let hit = scene
                .ray_query_nearest_hit(origin.extend(0.0), Vec4::new(0.0, 0.0, 1.0, 100.0));
            hits += hit.is_hit() as u32;
        }
    }
    hits
}

fn bench_ray_block_serial(c: &mut Criterion) {
    let scene = svs_scene(64);
    c.bench_function("ray_block_64x64_serial", |b| {
        b.iter(|| ray_block(black_box(&scene), 64));
    });
}

fn bench_ray_block_parallel(c: &mut Criterion) {
    let scene = svs_scene(64);
    let n = 64u32;
    c.bench_function("ray_block_64x64_rayon", |b| {
        b.iter(|| {
            (0..n)
                .into_par_iter()
                .map(|y| {
                    let mut hits = 0;
                    for x in 0..n {
                        let origin = Vec3::new(
                            2.0 * (x as f32 + 0.5) / n as f32 - 1.0,
                            2.0 * (y as f32 + 0.5) / n as f32 - 1.0,
                            -3.0,
                        );
                        let hit = scene.ray_query_nearest_hit(
                            origin.extend(0.0),
                            Vec4::new(0.0, 0.0, 1.0, 100.0),
                        );
                        hits += hit.is_hit() as u32;
                    }
                    hits
                })
                .sum::<u32>()
        });
    });
}

criterion_group!(
    benches,
    bench_blas_build_svs,
    bench_blas_build_mesh,
    bench_ray_block_serial,
    bench_ray_block_parallel,
);
criterion_main!(benches);
