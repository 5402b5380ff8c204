//! Gaussian point splats. Each splat is an anisotropic Gaussian defined by
//! a position, per-axis log scales and a rotation quaternion; intersection
//! treats the 3-sigma ellipsoid as a solid surface.

use bytemuck::{Pod, Zeroable};

use crate::core::types::{Mat3, Quat, Vec3, Vec4};
use crate::math::Aabb;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GsSplat {
    pub position: Vec3,
    pub opacity: f32,
    pub log_scale: Vec3,
    pub _pad0: f32,
    /// Rotation quaternion as (w, x, y, z)
    pub rotation: Vec4,
    pub color: Vec3,
    pub _pad1: f32,
}

impl GsSplat {
    pub fn new(position: Vec3, scale: Vec3, rotation: Quat, opacity: f32, color: Vec3) -> GsSplat {
        GsSplat {
            position,
            opacity,
            log_scale: Vec3::new(scale.x.ln(), scale.y.ln(), scale.z.ln()),
            _pad0: 0.0,
            rotation: Vec4::new(rotation.w, rotation.x, rotation.y, rotation.z),
            color,
            _pad1: 0.0,
        }
    }

    /// Covariance Sigma = (S R)^T (S R) with S = diag(exp(log_scale))
    pub fn covariance(&self) -> Mat3 {
        let q = Quat::from_xyzw(
            self.rotation.y,
            self.rotation.z,
            self.rotation.w,
            self.rotation.x,
        )
        .normalize();
        let r = Mat3::from_quat(q);
        let s = Vec3::new(
            self.log_scale.x.exp(),
            self.log_scale.y.exp(),
            self.log_scale.z.exp(),
        );
        let sr = Mat3::from_cols(r.x_axis * s, r.y_axis * s, r.z_axis * s);
        sr.transpose() * sr
    }

    /// Inverse covariance via cofactors, regularizing near-singular
    /// matrices by inflating the diagonal
    pub fn conic(&self) -> Mat3 {
        let mut m = self.covariance();
        let mut det = m.determinant();
        if det.abs() < 1e-9 {
            m.x_axis.x += 1e-9;
            m.y_axis.y += 1e-9;
            m.z_axis.z += 1e-9;
            det = m.determinant();
        }
        let inv_det = 1.0 / det;
        let c = m.to_cols_array_2d();
        Mat3::from_cols_array_2d(&[
            [
                (c[1][1] * c[2][2] - c[1][2] * c[2][1]) * inv_det,
                (c[0][2] * c[2][1] - c[0][1] * c[2][2]) * inv_det,
                (c[0][1] * c[1][2] - c[0][2] * c[1][1]) * inv_det,
            ],
            [
                (c[1][2] * c[2][0] - c[1][0] * c[2][2]) * inv_det,
                (c[0][0] * c[2][2] - c[0][2] * c[2][0]) * inv_det,
                (c[0][2] * c[1][0] - c[0][0] * c[1][2]) * inv_det,
            ],
            [
                (c[1][0] * c[2][1] - c[1][1] * c[2][0]) * inv_det,
                (c[0][1] * c[2][0] - c[0][0] * c[2][1]) * inv_det,
                (c[0][0] * c[1][1] - c[0][1] * c[1][0]) * inv_det,
            ],
        ])
    }

    /// Anisotropic 3-sigma bounding box from the covariance diagonal
    pub fn bounding_box(&self) -> Aabb {
        let m = self.covariance();
        let extent = 3.0 * Vec3::new(m.x_axis.x.sqrt(), m.y_axis.y.sqrt(), m.z_axis.z.sqrt());
        Aabb::new(self.position - extent, self.position + extent)
    }
}

/// Splats scattered on a sphere surface, for tests and benches
pub fn sphere_splats(count: u32, radius: f32, splat_scale: f32) -> Vec<GsSplat> {
    (0..count)
        .map(|i| {
            let h = i.wrapping_mul(0x9E37_79B9);
            let u = (h & 0xFFFF) as f32 / 65535.0;
            let v = (h >> 16) as f32 / 65535.0;
            let theta = std::f32::consts::TAU * u;
            let z = 2.0 * v - 1.0;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let dir = Vec3::new(r * theta.cos(), r * theta.sin(), z);
            GsSplat::new(
                dir * radius,
                Vec3::splat(splat_scale),
                Quat::IDENTITY,
                1.0,
                Vec3::new(u, v, 1.0 - u),
            )
        })
        .collect()
}
