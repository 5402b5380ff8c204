//! Dense SDF grids. A grid of `size` samples per axis spans the cube
//! [-1,1]^3; distances are recovered by trilinear interpolation of the
//! surrounding eight samples.

use crate::core::types::{UVec3, Vec3};

#[derive(Clone, Copy)]
pub struct SdfGridView<'a> {
    pub size: UVec3,
    pub data: &'a [f32],
}

impl<'a> SdfGridView<'a> {
    pub fn sample(&self, v: UVec3) -> f32 {
        let idx = (v.z * self.size.y * self.size.x + v.y * self.size.x + v.x) as usize;
        self.data[idx]
    }

    /// Trilinear distance at `pos` in [-1,1]^3; positions outside are
    /// clamped to the boundary samples.
    pub fn eval_distance(&self, pos: Vec3) -> f32 {
        let sizef = Vec3::new(self.size.x as f32, self.size.y as f32, self.size.z as f32);
        // sample i sits at -1 + 2*i/(size-1)
        let coord = (pos * 0.5 + Vec3::splat(0.5)) * (sizef - Vec3::ONE);
        let lo = coord.floor().clamp(Vec3::ZERO, sizef - 2.0 * Vec3::ONE);
        let frac = (coord - lo).clamp(Vec3::ZERO, Vec3::ONE);
        let base = UVec3::new(lo.x as u32, lo.y as u32, lo.z as u32);

        let corners = self.cell_corners(base);
        crate::trace::solver::eval_dist_trilinear(&corners, frac)
    }

    /// The eight samples of the cell with min corner `base`, in
    /// (x<<2 | y<<1 | z) order.
    pub fn cell_corners(&self, base: UVec3) -> [f32; 8] {
        let mut corners = [0.0f32; 8];
        for (i, c) in corners.iter_mut().enumerate() {
            let off = UVec3::new((i as u32 >> 2) & 1, (i as u32 >> 1) & 1, i as u32 & 1);
            *c = self.sample(base + off);
        }
        corners
    }

    /// World-space cell box for the cell with min corner `base`
    pub fn cell_box(&self, base: UVec3) -> (Vec3, Vec3) {
        let sizef = Vec3::new(self.size.x as f32, self.size.y as f32, self.size.z as f32);
        let inv = 2.0 / (sizef - Vec3::ONE);
        let min = Vec3::new(base.x as f32, base.y as f32, base.z as f32) * inv - Vec3::ONE;
        (min, min + inv)
    }

    /// Cell whose box covers `pos`, clamped into the grid
    pub fn cell_of(&self, pos: Vec3) -> UVec3 {
        let sizef = Vec3::new(self.size.x as f32, self.size.y as f32, self.size.z as f32);
        let coord = (pos * 0.5 + Vec3::splat(0.5)) * (sizef - Vec3::ONE);
        let lo = coord.floor().clamp(Vec3::ZERO, sizef - 2.0 * Vec3::ONE);
        UVec3::new(lo.x as u32, lo.y as u32, lo.z as u32)
    }
}

/// Dense grid sampling of a sphere SDF, for tests and benches
pub fn sphere_grid(size: u32, radius: f32) -> (UVec3, Vec<f32>) {
    let mut data = Vec::with_capacity((size * size * size) as usize);
    let step = 2.0 / (size - 1) as f32;
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let p = Vec3::new(x as f32, y as f32, z as f32) * step - Vec3::ONE;
                data.push(p.length() - radius);
            }
        }
    }
    (UVec3::splat(size), data)
}
