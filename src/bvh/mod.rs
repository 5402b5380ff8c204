//! Generic BVH construction over arrays of bounding boxes.
//!
//! Two output forms share one internal tree build:
//! - sibling-pair ("fat node") arrays for per-geometry BLASes, traversed
//!   with an explicit stack testing both children at once;
//! - escape-index-threaded flat arrays for the scene TLAS, traversed
//!   without a stack.

pub mod node;
pub mod builder;
pub mod preset;

pub use node::{BvhNode, BvhNodePair, LEAF_BIT, ESCAPE_END, MAX_LEAVES, pack_leaf, extract_start, extract_count};
pub use builder::{BvhTree, build_bvh_pairs, build_bvh_flat};
pub use preset::{BuildPreset, BuildQuality, NodeLayout};
