//! Sdfray - a multi-representation ray intersection engine
//!
//! Builds two-level acceleration structures (per-geometry BLAS, per-scene
//! TLAS) over triangle meshes and several signed-distance-field encodings,
//! and answers nearest-hit ray queries against instanced copies of them.

pub mod core;
pub mod math;
pub mod bvh;
pub mod geom;
pub mod scene;
pub mod trace;
