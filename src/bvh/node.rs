//! Flat BVH node records shared by BLAS and TLAS.
//!
//! `BvhNode` is 32 bytes and `Pod` so node arrays can be handed to a
//! compute backend without repacking.

use bytemuck::{Pod, Zeroable};
use crate::core::types::Vec3;
use crate::math::Aabb;

/// Top bit of `left_offset` marks a leaf node
pub const LEAF_BIT: u32 = 0x8000_0000;

/// Escape sentinel terminating stackless traversal
pub const ESCAPE_END: u32 = 0xFFFF_FFFE;

/// Leaf offsets carry 24 bits, capping the leaves of any one tree
pub const MAX_LEAVES: usize = 1 << 24;

/// Pack a leaf range into `left_offset`: bits 0..24 start, 24..31 count
pub fn pack_leaf(start: u32, count: u32) -> u32 {
    debug_assert!(start < (1 << 24));
    debug_assert!(count > 0 && count < 128);
    LEAF_BIT | (count << 24) | start
}

pub fn extract_start(left_offset: u32) -> u32 {
    left_offset & 0x00FF_FFFF
}

pub fn extract_count(left_offset: u32) -> u32 {
    (left_offset >> 24) & 0x7F
}

/// One BVH node: box, child/leaf offset and traversal escape index
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub box_min: Vec3,
    /// Internal: pair index of the children. Leaf: `LEAF_BIT | count<<24 | start`.
    pub left_offset: u32,
    pub box_max: Vec3,
    /// Next node to visit on miss/exit (stackless layouts only)
    pub escape_index: u32,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.left_offset & LEAF_BIT != 0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.box_min, self.box_max)
    }
}

/// Two sibling nodes stored contiguously so both box tests happen per step
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNodePair {
    pub left: BvhNode,
    pub right: BvhNode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_packing() {
        let packed = pack_leaf(1234, 7);
        assert_eq!(extract_start(packed), 1234);
        assert_eq!(extract_count(packed), 7);
        assert_ne!(packed & LEAF_BIT, 0);
    }

    #[test]
    fn test_node_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 32);
        assert_eq!(std::mem::size_of::<BvhNodePair>(), 64);
    }
}
