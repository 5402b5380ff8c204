//! Indexed triangle meshes. Vertices are stored as `Vec4` with w == 1 so
//! the arrays stay `Pod` and 16-byte aligned.

use crate::core::types::{Vec3, Vec4};
use crate::math::Aabb;

/// Borrowed view over one mesh's slice of the shared vertex/index arenas
#[derive(Clone, Copy)]
pub struct MeshView<'a> {
    pub vertices: &'a [Vec4],
    pub indices: &'a [u32],
}

impl<'a> MeshView<'a> {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangle(&self, tri: usize) -> [Vec3; 3] {
        let i = 3 * tri;
        [
            self.vertices[self.indices[i] as usize].truncate(),
            self.vertices[self.indices[i + 1] as usize].truncate(),
            self.vertices[self.indices[i + 2] as usize].truncate(),
        ]
    }

    pub fn triangle_box(&self, tri: usize) -> Aabb {
        let [a, b, c] = self.triangle(tri);
        let mut bb = Aabb::empty();
        bb.expand(a);
        bb.expand(b);
        bb.expand(c);
        bb
    }

    pub fn bounds(&self) -> Aabb {
        let mut bb = Aabb::empty();
        for v in self.vertices {
            bb.expand(v.truncate());
        }
        bb
    }
}

/// Axis-aligned unit cube centered at the origin, 12 triangles with
/// outward winding. Used by tests and benches as a known-good mesh.
pub fn unit_cube_mesh() -> (Vec<Vec4>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(8);
    for i in 0..8u32 {
        let x = if i & 1 != 0 { 0.5 } else { -0.5 };
        let y = if i & 2 != 0 { 0.5 } else { -0.5 };
        let z = if i & 4 != 0 { 0.5 } else { -0.5 };
        vertices.push(Vec4::new(x, y, z, 1.0));
    }
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1,  1, 2, 3, // -z
        4, 5, 6,  5, 7, 6, // +z
        0, 1, 4,  1, 5, 4, // -y
        2, 6, 3,  3, 6, 7, // +y
        0, 4, 2,  2, 4, 6, // -x
        1, 3, 5,  3, 7, 5, // +x
    ];
    (vertices, indices)
}
