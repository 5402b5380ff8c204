//! hp-adaptive octree SDFs: leaf cells carry polynomial coefficients over
//! a normalized Legendre tensor basis instead of corner samples.
//!
//! Basis functions are ordered by total degree, then by descending x and
//! y exponents. Each axis factor is P_j scaled by sqrt(2j+1) * 2^(depth/2)
//! so the basis stays orthonormal on the shrinking cell support.

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;
use crate::math::Aabb;

pub const MAX_DEGREE: u32 = 8;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct HpOctreeNode {
    /// Cell lattice x in the high 16 bits, y in the low 16
    pub pos_xy: u32,
    /// Cell lattice z in the high 16 bits, cells per axis in the low 16
    pub pos_z_lod_size: u32,
    /// Polynomial degree in the low 16 bits
    pub degree_lod: u32,
    /// First coefficient within the shared data array
    pub data_offset: u32,
}

impl HpOctreeNode {
    pub fn pos(&self) -> [u32; 3] {
        [self.pos_xy >> 16, self.pos_xy & 0xFFFF, self.pos_z_lod_size >> 16]
    }

    pub fn lod_size(&self) -> u32 {
        self.pos_z_lod_size & 0xFFFF
    }

    pub fn degree(&self) -> u32 {
        self.degree_lod & 0xFFFF
    }

    /// Octree depth of this cell; lod_size is always a power of two
    pub fn depth(&self) -> u32 {
        self.lod_size().trailing_zeros()
    }

    pub fn coeff_count(&self) -> usize {
        coeff_count(self.degree())
    }

    /// Cell box within [-1,1]^3
    pub fn cell_box(&self) -> Aabb {
        let [x, y, z] = self.pos();
        let sz = self.lod_size() as f32;
        let min = 2.0 * Vec3::new(x as f32, y as f32, z as f32) / sz - Vec3::ONE;
        Aabb::new(min, min + Vec3::splat(2.0 / sz))
    }
}

/// Coefficients of a full tensor basis up to total degree `d`
pub fn coeff_count(d: u32) -> usize {
    ((d + 1) * (d + 2) * (d + 3) / 6) as usize
}

/// Legendre polynomials P_0..P_degree at x, via the three-term recurrence
fn legendre(x: f32, degree: u32, out: &mut [f32]) {
    out[0] = 1.0;
    if degree >= 1 {
        out[1] = x;
    }
    for j in 2..=degree as usize {
        let jf = j as f32;
        out[j] = ((2.0 * jf - 1.0) * x * out[j - 1] - (jf - 1.0) * out[j - 2]) / jf;
    }
}

/// Evaluate a cell polynomial at `unit` in [0,1]^3 cell-local coordinates
pub fn eval_poly(coeffs: &[f32], degree: u32, depth: u32, unit: Vec3) -> f32 {
    debug_assert!(degree <= MAX_DEGREE);
    debug_assert_eq!(coeffs.len(), coeff_count(degree));
    let p = 2.0 * unit - Vec3::ONE;
    let mut lx = [0.0f32; MAX_DEGREE as usize + 1];
    let mut ly = [0.0f32; MAX_DEGREE as usize + 1];
    let mut lz = [0.0f32; MAX_DEGREE as usize + 1];
    legendre(p.x, degree, &mut lx);
    legendre(p.y, degree, &mut ly);
    legendre(p.z, degree, &mut lz);

    let scale = (2.0f32).powi(depth as i32 / 2)
        * if depth % 2 == 1 { std::f32::consts::SQRT_2 } else { 1.0 };
    for j in 0..=degree as usize {
        let norm = ((2 * j + 1) as f32).sqrt() * scale;
        lx[j] *= norm;
        ly[j] *= norm;
        lz[j] *= norm;
    }

    let mut sum = 0.0;
    let mut c = 0;
    for total in 0..=degree {
        for i in (0..=total).rev() {
            for j in (0..=total - i).rev() {
                let k = total - i - j;
                sum += coeffs[c] * lx[i as usize] * ly[j as usize] * lz[k as usize];
                c += 1;
            }
        }
    }
    sum
}

#[derive(Clone, Copy)]
pub struct HpOctreeView<'a> {
    pub nodes: &'a [HpOctreeNode],
    pub data: &'a [f32],
}

impl<'a> HpOctreeView<'a> {
    pub fn coeffs(&self, node: &HpOctreeNode) -> &'a [f32] {
        let start = node.data_offset as usize;
        &self.data[start..start + node.coeff_count()]
    }

    /// Distance at `pos` in [-1,1]^3, evaluated through `node`'s polynomial
    pub fn eval_at(&self, node: &HpOctreeNode, pos: Vec3) -> f32 {
        let bb = node.cell_box();
        let unit = ((pos - bb.min) / bb.size()).clamp(Vec3::ZERO, Vec3::ONE);
        eval_poly(self.coeffs(node), node.degree(), node.depth(), unit)
    }

    /// Corner distances of `node`'s cell in (x<<2 | y<<1 | z) order
    pub fn cell_corners(&self, node: &HpOctreeNode) -> [f32; 8] {
        let coeffs = self.coeffs(node);
        std::array::from_fn(|i| {
            let unit = Vec3::new(
                (i >> 2 & 1) as f32,
                (i >> 1 & 1) as f32,
                (i & 1) as f32,
            );
            eval_poly(coeffs, node.degree(), node.depth(), unit)
        })
    }
}

/// Degree-1 hp cells fitted to a sphere SDF at resolution `lod_size`
/// (power of two), for tests and benches. Each surface cell carries the
/// tangent-plane linearization of the distance field at its center.
pub fn sphere_hp(lod_size: u32, radius: f32) -> (Vec<HpOctreeNode>, Vec<f32>) {
    assert!(lod_size.is_power_of_two());
    let depth = lod_size.trailing_zeros();
    let mut nodes = Vec::new();
    let mut data = Vec::new();
    let cell = 2.0 / lod_size as f32;
    let half = cell * 0.5;
    // total normalization for this depth is 2^(3*depth/2)
    let s3 = (2.0f32).powi(depth as i32).powf(1.5);

    for x in 0..lod_size {
        for y in 0..lod_size {
            for z in 0..lod_size {
                let min = Vec3::new(x as f32, y as f32, z as f32) * cell - Vec3::ONE;
                let center = min + Vec3::splat(half);
                let d = center.length() - radius;
                if d.abs() > 3.0f32.sqrt() * half {
                    continue;
                }
                let n = center.normalize_or_zero();
                let data_offset = data.len() as u32;
                // projection of d + n.(p - center) onto the normalized basis
                data.push(d / s3);
                data.push(half * n.x / (3.0f32.sqrt() * s3));
                data.push(half * n.y / (3.0f32.sqrt() * s3));
                data.push(half * n.z / (3.0f32.sqrt() * s3));
                nodes.push(HpOctreeNode {
                    pos_xy: (x << 16) | y,
                    pos_z_lod_size: (z << 16) | lod_size,
                    degree_lod: 1,
                    data_offset,
                });
            }
        }
    }
    (nodes, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_cell() {
        let depth = 3u32;
        let s3 = (2.0f32).powi(depth as i32).powf(1.5);
        let coeffs = [0.25 / s3];
        for unit in [Vec3::ZERO, Vec3::ONE, Vec3::splat(0.3)] {
            assert!((eval_poly(&coeffs, 0, depth, unit) - 0.25).abs() < 1e-5);
        }
    }

    #[test]
    fn test_linear_cell_reproduces_plane() {
        let (nodes, data) = sphere_hp(8, 0.6);
        assert!(!nodes.is_empty());
        let view = HpOctreeView { nodes: &nodes, data: &data };
        for node in nodes.iter().take(16) {
            let bb = node.cell_box();
            let center = bb.center();
            let truth = center.length() - 0.6;
            assert!((view.eval_at(node, center) - truth).abs() < 1e-4);
        }
    }

    #[test]
    fn test_coeff_count() {
        assert_eq!(coeff_count(0), 1);
        assert_eq!(coeff_count(1), 4);
        assert_eq!(coeff_count(2), 10);
        assert_eq!(coeff_count(3), 20);
    }

    #[test]
    fn test_corner_continuity_with_field() {
        let (nodes, data) = sphere_hp(16, 0.7);
        let view = HpOctreeView { nodes: &nodes, data: &data };
        for node in nodes.iter().take(8) {
            let corners = view.cell_corners(node);
            let bb = node.cell_box();
            for (i, &c) in corners.iter().enumerate() {
                let p = bb.min
                    + bb.size()
                        * Vec3::new((i >> 2 & 1) as f32, (i >> 1 & 1) as f32, (i & 1) as f32);
                // linear fit error is second order in the cell size
                assert!((c - (p.length() - 0.7)).abs() < 0.02);
            }
        }
    }
}
