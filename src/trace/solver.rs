//! Root finding for the trilinear field inside one cell.
//!
//! Along a ray the trilinear interpolant of eight corner values is a
//! cubic in t. The analytic and Newton solvers work on that cubic
//! directly, following "Ray Tracing of Signed Distance Function Grids"
//! (JCGT vol. 11 no. 3, 2022); sphere and interval tracing march the
//! interpolant instead.

use crate::core::types::Vec3;
use super::preset::{SolverKind, TracePreset};

const EPS: f32 = 1e-6;

/// Trilinear interpolation of corner values in (x<<2 | y<<1 | z) order,
/// `dp` in [0,1]^3
pub fn eval_dist_trilinear(values: &[f32; 8], dp: Vec3) -> f32 {
    (1.0 - dp.x) * (1.0 - dp.y) * (1.0 - dp.z) * values[0]
        + (1.0 - dp.x) * (1.0 - dp.y) * dp.z * values[1]
        + (1.0 - dp.x) * dp.y * (1.0 - dp.z) * values[2]
        + (1.0 - dp.x) * dp.y * dp.z * values[3]
        + dp.x * (1.0 - dp.y) * (1.0 - dp.z) * values[4]
        + dp.x * (1.0 - dp.y) * dp.z * values[5]
        + dp.x * dp.y * (1.0 - dp.z) * values[6]
        + dp.x * dp.y * dp.z * values[7]
}

/// Gradient of the trilinear interpolant at `dp`
pub fn trilinear_grad(values: &[f32; 8], dp: Vec3) -> Vec3 {
    let ddx = -(1.0 - dp.y) * (1.0 - dp.z) * values[0]
        - (1.0 - dp.y) * dp.z * values[1]
        - dp.y * (1.0 - dp.z) * values[2]
        - dp.y * dp.z * values[3]
        + (1.0 - dp.y) * (1.0 - dp.z) * values[4]
        + (1.0 - dp.y) * dp.z * values[5]
        + dp.y * (1.0 - dp.z) * values[6]
        + dp.y * dp.z * values[7];
    let ddy = -(1.0 - dp.x) * (1.0 - dp.z) * values[0]
        - (1.0 - dp.x) * dp.z * values[1]
        + (1.0 - dp.x) * (1.0 - dp.z) * values[2]
        + (1.0 - dp.x) * dp.z * values[3]
        - dp.x * (1.0 - dp.z) * values[4]
        - dp.x * dp.z * values[5]
        + dp.x * (1.0 - dp.z) * values[6]
        + dp.x * dp.z * values[7];
    let ddz = -(1.0 - dp.x) * (1.0 - dp.y) * values[0]
        + (1.0 - dp.x) * (1.0 - dp.y) * values[1]
        - (1.0 - dp.x) * dp.y * values[2]
        + (1.0 - dp.x) * dp.y * values[3]
        - dp.x * (1.0 - dp.y) * values[4]
        + dp.x * (1.0 - dp.y) * values[5]
        - dp.x * dp.y * values[6]
        + dp.x * dp.y * values[7];
    Vec3::new(ddx, ddy, ddz)
}

/// Trilinear interpolation of per-corner colors
pub fn eval_color_trilinear(colors: &[Vec3; 8], dp: Vec3) -> Vec3 {
    (1.0 - dp.x) * (1.0 - dp.y) * (1.0 - dp.z) * colors[0]
        + (1.0 - dp.x) * (1.0 - dp.y) * dp.z * colors[1]
        + (1.0 - dp.x) * dp.y * (1.0 - dp.z) * colors[2]
        + (1.0 - dp.x) * dp.y * dp.z * colors[3]
        + dp.x * (1.0 - dp.y) * (1.0 - dp.z) * colors[4]
        + dp.x * (1.0 - dp.y) * dp.z * colors[5]
        + dp.x * dp.y * (1.0 - dp.z) * colors[6]
        + dp.x * dp.y * dp.z * colors[7]
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Cubic coefficients of the interpolant along `o + t*dir`:
/// f(t) = c3*t^3 + c2*t^2 + c1*t + c0
fn cubic_coeffs(values: &[f32; 8], o: Vec3, dir: Vec3) -> [f32; 4] {
    let s000 = values[0];
    let s001 = values[1];
    let s010 = values[2];
    let s011 = values[3];
    let s100 = values[4];
    let s101 = values[5];
    let s110 = values[6];
    let s111 = values[7];

    let a = s101 - s001;

    let k0 = s000;
    let k1 = s100 - s000;
    let k2 = s010 - s000;
    let k3 = s110 - s010 - k1;
    let k4 = k0 - s001;
    let k5 = k1 - a;
    let k6 = k2 - (s011 - s001);
    let k7 = k3 - (s111 - s011 - a);

    let m0 = o.x * o.y;
    let m1 = dir.x * dir.y;
    let m2 = o.x * dir.y + o.y * dir.x;
    let m3 = k5 * o.z - k1;
    let m4 = k6 * o.z - k2;
    let m5 = k7 * o.z - k3;

    let c0 = (k4 * o.z - k0) + o.x * m3 + o.y * m4 + m0 * m5;
    let c1 = dir.x * m3
        + dir.y * m4
        + m2 * m5
        + dir.z * (k4 + k5 * o.x + k6 * o.y + k7 * m0);
    let c2 = m1 * m5 + dir.z * (k5 * dir.x + k6 * dir.y + k7 * m2);
    let c3 = k7 * m1 * dir.z;
    [c0, c1, c2, c3]
}

fn eval_cubic(c: &[f32; 4], t: f32) -> f32 {
    c[0] + t * (c[1] + t * (c[2] + t * c[3]))
}

fn analytic_root(c: &[f32; 4], q_far: f32) -> Option<f32> {
    let [c0, c1, c2, c3] = *c;
    let mut x1 = 1000.0f32;
    let mut x2 = 1000.0f32;
    let mut x3 = 1000.0f32;
    if c3.abs() > 1e-2 {
        // cubic; Vieta's trigonometric method for the three-root case
        let a = c2 / c3;
        let b = c1 / c3;
        let c = c0 / c3;

        let q = (a * a - 3.0 * b) / 9.0;
        let r = (2.0 * a * a * a - 9.0 * a * b + 27.0 * c) / 54.0;
        let q3 = q * q * q;

        if r * r < q3 {
            let theta = (r / q3.sqrt()).acos();
            let tau = std::f32::consts::TAU;
            x1 = -2.0 * q.sqrt() * (theta / 3.0).cos() - a / 3.0;
            x2 = -2.0 * q.sqrt() * ((theta + tau) / 3.0).cos() - a / 3.0;
            x3 = -2.0 * q.sqrt() * ((theta - tau) / 3.0).cos() - a / 3.0;
        } else {
            let big_a = -sign(r) * (r.abs() + (r * r - q3).sqrt()).powf(1.0 / 3.0);
            let big_b = if big_a.abs() > EPS { q / big_a } else { 0.0 };
            x1 = big_a + big_b - a / 3.0;
        }
    } else if c2.abs() > 1e-4 {
        let d = c1 * c1 - 4.0 * c2 * c0;
        if d > 0.0 {
            let q = -0.5 * (c1 + sign(c1) * d.sqrt());
            x1 = q / c2;
            if q.abs() > EPS {
                x2 = c0 / q;
            }
        }
    } else if c1.abs() > EPS {
        x1 = -c0 / c1;
    }

    x1 = if x1 < 0.0 { 1000.0 } else { x1 };
    x2 = if x2 < 0.0 { 1000.0 } else { x2 };
    x3 = if x3 < 0.0 { 1000.0 } else { x3 };

    let t = x1.min(x2.min(x3));
    (t >= 0.0 && t <= q_far).then_some(t)
}

fn newton_root(c: &[f32; 4], q_far: f32, max_iters: u32) -> Option<f32> {
    let [c0, c1, c2, c3] = *c;
    // bracket the first sign change between critical points of the cubic
    let a = 3.0 * c3;
    let b = 2.0 * c2;

    let t0 = 0.0f32;
    let mut t1 = q_far;
    let mut t2 = q_far;
    let t3 = q_far;

    let d = b * b - 4.0 * a * c1;
    if d >= 0.0 {
        let q = -0.5 * (b + sign(b) * d.sqrt());
        let r1 = if a.abs() > EPS { q / a } else { t0 };
        let r2 = if q.abs() > EPS { c1 / q } else { q_far };
        t1 = r1.min(r2).clamp(t0, t3);
        t2 = r1.max(r2).clamp(t0, t3);
    }

    let s0 = eval_cubic(c, t0) > 0.0;
    let s1 = eval_cubic(c, t1) > 0.0;
    let s2 = eval_cubic(c, t2) > 0.0;
    let s3 = eval_cubic(c, t3) > 0.0;

    let (nwt_min, nwt_max) = if s0 != s1 {
        (t0, t1)
    } else if s1 != s2 {
        (t1, t2)
    } else if s2 != s3 {
        (t2, t3)
    } else {
        (t0, t0)
    };
    if nwt_min >= nwt_max {
        return None;
    }

    let mut rtn = 0.5 * (nwt_min + nwt_max);
    let mut f = 1000.0f32;
    let mut iter = 0;
    while iter < max_iters && f.abs() >= EPS {
        f = c0 + rtn * (c1 + rtn * (c2 + rtn * c3));
        let df = c1 + rtn * (2.0 * c2 + rtn * 3.0 * c3);
        rtn -= f / (df + sign(df) * 1e-9);
        iter += 1;
    }
    (rtn >= 0.0 && rtn <= q_far && f.abs() < EPS).then_some(rtn)
}

/// Intersect a ray with the zero crossing of the trilinear field inside
/// one cell.
///
/// `start_q` is the cell-local ray entry in [0,1]^3, `dir` the
/// unnormalized instance-space direction, `d` the world size of the cell
/// and `q_far` the exit parameter. Returns the crossing parameter in
/// cell units; the world hit is `t_entry + d * t`.
pub fn local_surface_intersection(
    preset: &TracePreset,
    dir: Vec3,
    values: &[f32; 8],
    d: f32,
    q_far: f32,
    start_q: Vec3,
) -> Option<f32> {
    let d_inv = 1.0 / d;
    let start_dist = eval_dist_trilinear(values, start_q);
    if start_dist <= EPS || preset.solver == SolverKind::Bbox {
        return Some(0.0);
    }

    match preset.solver {
        SolverKind::Bbox => unreachable!(),
        SolverKind::SphereTracing => {
            let mut t = 0.0f32;
            let mut dist = start_dist;
            let mut iter = 0;
            while t < q_far && dist > EPS && iter < preset.st_max_iters {
                t += dist * d_inv;
                dist = eval_dist_trilinear(values, start_q + t * dir);
                iter += 1;
            }
            (dist <= EPS).then_some(t)
        }
        SolverKind::IntervalTracing | SolverKind::Analytic | SolverKind::Newton => {
            // scaling all corners by 1/d leaves the roots unchanged and
            // matches the sphere-tracing step metric
            let scaled: [f32; 8] = std::array::from_fn(|i| values[i] * d_inv);
            let c = cubic_coeffs(&scaled, start_q, dir);
            match preset.solver {
                SolverKind::Analytic => analytic_root(&c, q_far),
                SolverKind::Newton => newton_root(&c, q_far, preset.newton_max_iters),
                _ => {
                    // interval tracing: step by distance over a local
                    // Lipschitz bound on the cubic. The cubic's derivative
                    // is quadratic, so its magnitude over [t, t+e] peaks at
                    // an endpoint or at the derivative's critical point.
                    let k = 2.0f32;
                    let mut e = 0.1 * q_far;
                    let t_max = if c[3].abs() < EPS { 1e6 } else { -c[2] / (3.0 * c[3]) };
                    let df_max = 3.0 * c[3] * t_max * t_max + 2.0 * c[2] * t_max + c[1];

                    let mut t = 0.0f32;
                    let mut dist = start_dist;
                    let mut iter = 0;
                    while t < q_far && dist > EPS && iter < preset.it_max_iters {
                        let df_1 = 3.0 * c[3] * t * t + 2.0 * c[2] * t + c[1];
                        let te = t + e;
                        let df_2 = 3.0 * c[3] * te * te + 2.0 * c[2] * te + c[1];
                        let mut l = if t_max > t && t_max < t + e {
                            df_max.abs().max(df_1.abs().max(df_2.abs()))
                        } else {
                            df_1.abs().max(df_2.abs())
                        };
                        l = l.max(EPS);
                        let s = ((dist * d_inv) / l).min(e);
                        t += s;
                        e = k * s;
                        dist = eval_dist_trilinear(values, start_q + t * dir);
                        iter += 1;
                    }
                    (dist <= EPS).then_some(t)
                }
            }
        }
    }
}
