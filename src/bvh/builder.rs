//! BVH construction: one internal binary tree build, two output layouts.
//!
//! Every internal node has exactly two children; an N-leaf tree is stored
//! as N-1 sibling pairs. Single-box inputs are padded with a placeholder
//! box far from the geometry so the pairing invariant holds for N==2.

use crate::core::types::Vec3;
use crate::math::Aabb;
use super::node::{BvhNode, BvhNodePair, LEAF_BIT, ESCAPE_END, pack_leaf};
use super::preset::{BuildPreset, BuildQuality, NodeLayout};

/// Placeholder box used to pad single-leaf inputs
const PAD_BOX: Aabb = Aabb {
    min: Vec3::new(1000.0, 1000.0, 1000.0),
    max: Vec3::new(1000.1, 1000.1, 1000.1),
};

const SAH_BINS: usize = 16;

/// Result of a pair-layout build
pub struct BvhTree {
    pub pairs: Vec<BvhNodePair>,
    /// Leaf slot -> input box index. A bijection onto 0..N for N >= 2;
    /// for a padded single-box input the one real index appears twice.
    pub leaf_order: Vec<u32>,
}

#[derive(Clone, Copy)]
enum Child {
    /// Arena index of an internal node
    Node(u32),
    /// Leaf slot in the permuted order
    Leaf(u32),
}

struct Internal {
    left: Child,
    right: Child,
    left_bounds: Aabb,
    right_bounds: Aabb,
    /// Leaves under this node, for escape-index threading
    leaves: u32,
}

struct Builder<'a> {
    boxes: &'a [Aabb],
    centroids: Vec<Vec3>,
    perm: Vec<u32>,
    arena: Vec<Internal>,
    quality: BuildQuality,
}

impl<'a> Builder<'a> {
    fn new(boxes: &'a [Aabb], quality: BuildQuality) -> Self {
        let centroids = boxes.iter().map(|b| b.center()).collect();
        Self {
            boxes,
            centroids,
            perm: (0..boxes.len() as u32).collect(),
            arena: Vec::with_capacity(boxes.len()),
            quality,
        }
    }

    fn bounds_of(&self, start: usize, end: usize) -> Aabb {
        let mut b = Aabb::empty();
        for &i in &self.perm[start..end] {
            b = b.merged(&self.boxes[i as usize]);
        }
        b
    }

    /// Split position in [start+1, end-1] after reordering perm[start..end]
    fn split(&mut self, start: usize, end: usize) -> usize {
        let mut cb = Aabb::empty();
        for &i in &self.perm[start..end] {
            cb.expand(self.centroids[i as usize]);
        }
        let extent = cb.size();
        let axis = if extent.y > extent.x && extent.y >= extent.z {
            1
        } else if extent.z > extent.x {
            2
        } else {
            0
        };

        if self.quality == BuildQuality::High && extent[axis] > 1e-12 {
            if let Some(mid) = self.split_sah(start, end, axis, cb.min[axis], extent[axis]) {
                return mid;
            }
        }
        self.split_median(start, end, axis)
    }

    fn split_median(&mut self, start: usize, end: usize, axis: usize) -> usize {
        let centroids = &self.centroids;
        // index tiebreak keeps the ordering deterministic for equal keys
        self.perm[start..end].sort_unstable_by(|&a, &b| {
            let ca = centroids[a as usize][axis];
            let cb = centroids[b as usize][axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
        });
        start + (end - start) / 2
    }

    /// Binned SAH sweep; None when no split beats putting everything in one bin
    fn split_sah(&mut self, start: usize, end: usize, axis: usize, cmin: f32, cext: f32) -> Option<usize> {
        let scale = SAH_BINS as f32 / cext;
        let bin_of = |c: f32| (((c - cmin) * scale) as usize).min(SAH_BINS - 1);

        let mut bins = [(Aabb::empty(), 0u32); SAH_BINS];
        for &i in &self.perm[start..end] {
            let b = bin_of(self.centroids[i as usize][axis]);
            bins[b].0 = bins[b].0.merged(&self.boxes[i as usize]);
            bins[b].1 += 1;
        }

        let mut left_area = [0.0f32; SAH_BINS];
        let mut left_count = [0u32; SAH_BINS];
        let mut acc = Aabb::empty();
        let mut sum = 0;
        for i in 0..SAH_BINS {
            sum += bins[i].1;
            acc = acc.merged(&bins[i].0);
            left_area[i] = acc.area();
            left_count[i] = sum;
        }

        let mut right_area = [0.0f32; SAH_BINS];
        let mut right_count = [0u32; SAH_BINS];
        acc = Aabb::empty();
        sum = 0;
        for i in (0..SAH_BINS).rev() {
            sum += bins[i].1;
            acc = acc.merged(&bins[i].0);
            right_area[i] = acc.area();
            right_count[i] = sum;
        }

        let mut best_cost = f32::INFINITY;
        let mut best_split = usize::MAX;
        for i in 0..SAH_BINS - 1 {
            if left_count[i] == 0 || right_count[i + 1] == 0 {
                continue;
            }
            let cost = left_area[i] * left_count[i] as f32
                + right_area[i + 1] * right_count[i + 1] as f32;
            if cost < best_cost {
                best_cost = cost;
                best_split = i;
            }
        }
        if best_split == usize::MAX {
            return None;
        }

        let centroids = &self.centroids;
        self.perm[start..end].sort_unstable_by(|&a, &b| {
            let ba = bin_of(centroids[a as usize][axis]);
            let bb = bin_of(centroids[b as usize][axis]);
            ba.cmp(&bb).then(a.cmp(&b))
        });
        let mid = start + left_count[best_split] as usize;
        debug_assert!(mid > start && mid < end);
        Some(mid)
    }

    fn build_range(&mut self, start: usize, end: usize) -> (Child, Aabb) {
        debug_assert!(end > start);
        if end - start == 1 {
            let slot = start as u32;
            return (Child::Leaf(slot), self.boxes[self.perm[start] as usize]);
        }
        let mid = self.split(start, end);
        let (left, left_bounds) = self.build_range(start, mid);
        let (right, right_bounds) = self.build_range(mid, end);
        let id = self.arena.len() as u32;
        self.arena.push(Internal {
            left,
            right,
            left_bounds,
            right_bounds,
            leaves: (end - start) as u32,
        });
        (Child::Node(id), left_bounds.merged(&right_bounds))
    }

    fn leaves_under(&self, child: Child) -> u32 {
        match child {
            Child::Leaf(_) => 1,
            Child::Node(id) => self.arena[id as usize].leaves,
        }
    }
}

fn padded<'a>(boxes: &'a [Aabb], storage: &'a mut Vec<Aabb>) -> &'a [Aabb] {
    assert!(!boxes.is_empty(), "BVH build over zero boxes");
    if boxes.len() >= 2 {
        boxes
    } else {
        storage.push(boxes[0]);
        storage.push(PAD_BOX);
        storage
    }
}

/// Build a sibling-pair BVH over `boxes` (BLAS form).
///
/// Returns N-1 pairs for N leaves plus the leaf-slot permutation. The
/// traversal entry point is pair 0, holding the two children of the root.
pub fn build_bvh_pairs(boxes: &[Aabb], preset: BuildPreset) -> BvhTree {
    let mut storage = Vec::new();
    let padded_single = boxes.len() == 1;
    let boxes = padded(boxes, &mut storage);

    let mut b = Builder::new(boxes, preset.quality);
    let (root, _) = b.build_range(0, boxes.len());
    if padded_single {
        // the placeholder leaf must still address the one real box
        b.perm.fill(0);
    }
    let Child::Node(root_id) = root else {
        unreachable!("two or more boxes always produce an internal root");
    };

    // pair slot per internal node, in the preset's layout order
    let mut slot_of = vec![u32::MAX; b.arena.len()];
    let order = match preset.layout {
        NodeLayout::DepthFirst => dfs_order(&b, root_id),
        NodeLayout::BreadthFirst => bfs_order(&b, root_id),
    };
    for (slot, &id) in order.iter().enumerate() {
        slot_of[id as usize] = slot as u32;
    }
    debug_assert_eq!(slot_of[root_id as usize], 0);

    // leaves pack the original input-box index, so per-representation
    // intersection code can address its payload without an extra remap
    let perm = &b.perm;
    let child_node = |child: Child, bounds: Aabb| -> BvhNode {
        let left_offset = match child {
            Child::Leaf(slot) => pack_leaf(perm[slot as usize], 1),
            Child::Node(id) => slot_of[id as usize],
        };
        BvhNode {
            box_min: bounds.min,
            left_offset,
            box_max: bounds.max,
            escape_index: ESCAPE_END,
        }
    };

    let mut pairs = vec![BvhNodePair::default(); b.arena.len()];
    for &id in &order {
        let n = &b.arena[id as usize];
        pairs[slot_of[id as usize] as usize] = BvhNodePair {
            left: child_node(n.left, n.left_bounds),
            right: child_node(n.right, n.right_bounds),
        };
    }

    let leaf_order = b.perm;
    if !padded_single {
        debug_assert!(is_permutation(&leaf_order));
    }
    BvhTree { pairs, leaf_order }
}

/// Build a flat escape-threaded BVH over `boxes` (TLAS form).
///
/// Leaves store `LEAF_BIT | input_index` directly; internal nodes store
/// the index of their left child, with the right child reached through
/// the left subtree's escape index. The root's escape is [`ESCAPE_END`].
pub fn build_bvh_flat(boxes: &[Aabb], preset: BuildPreset) -> Vec<BvhNode> {
    let mut storage = Vec::new();
    let padded_single = boxes.len() == 1;
    let boxes = padded(boxes, &mut storage);

    let mut b = Builder::new(boxes, preset.quality);
    let (root, root_bounds) = b.build_range(0, boxes.len());
    if padded_single {
        b.perm.fill(0);
    }

    let mut out = Vec::with_capacity(2 * boxes.len() - 1);
    emit_flat(&b, root, root_bounds, ESCAPE_END, &mut out);
    out
}

fn emit_flat(b: &Builder, child: Child, bounds: Aabb, escape: u32, out: &mut Vec<BvhNode>) {
    match child {
        Child::Leaf(slot) => {
            let input_idx = b.perm[slot as usize];
            out.push(BvhNode {
                box_min: bounds.min,
                left_offset: LEAF_BIT | input_idx,
                box_max: bounds.max,
                escape_index: escape,
            });
        }
        Child::Node(id) => {
            let n = &b.arena[id as usize];
            let me = out.len() as u32;
            out.push(BvhNode {
                box_min: bounds.min,
                left_offset: me + 1,
                box_max: bounds.max,
                escape_index: escape,
            });
            // subtree of K leaves occupies 2K-1 slots
            let right_start = me + 1 + (2 * b.leaves_under(n.left) - 1);
            emit_flat(b, n.left, n.left_bounds, right_start, out);
            debug_assert_eq!(out.len() as u32, right_start);
            emit_flat(b, n.right, n.right_bounds, escape, out);
        }
    }
}

fn dfs_order(b: &Builder, root: u32) -> Vec<u32> {
    let mut order = Vec::with_capacity(b.arena.len());
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        order.push(id);
        let n = &b.arena[id as usize];
        // push right first so the left subtree is emitted first
        if let Child::Node(r) = n.right {
            stack.push(r);
        }
        if let Child::Node(l) = n.left {
            stack.push(l);
        }
    }
    order
}

fn bfs_order(b: &Builder, root: u32) -> Vec<u32> {
    let mut order = Vec::with_capacity(b.arena.len());
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        order.push(id);
        let n = &b.arena[id as usize];
        if let Child::Node(l) = n.left {
            queue.push_back(l);
        }
        if let Child::Node(r) = n.right {
            queue.push_back(r);
        }
    }
    order
}

fn is_permutation(leaf_order: &[u32]) -> bool {
    let mut seen = vec![false; leaf_order.len()];
    for &i in leaf_order {
        if i as usize >= seen.len() || seen[i as usize] {
            return false;
        }
        seen[i as usize] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::node::{extract_start, extract_count};

    fn boxes_grid(n: usize) -> Vec<Aabb> {
        // deterministic pseudo-random layout from an integer hash
        (0..n)
            .map(|i| {
                let h = (i as u32).wrapping_mul(0x9E37_79B9);
                let x = (h & 0xFF) as f32 / 16.0;
                let y = ((h >> 8) & 0xFF) as f32 / 16.0;
                let z = ((h >> 16) & 0xFF) as f32 / 16.0;
                let min = Vec3::new(x, y, z);
                Aabb::new(min, min + Vec3::splat(0.5))
            })
            .collect()
    }

    fn all_presets() -> Vec<BuildPreset> {
        ["median_fast", "median_fast_bfs", "sah", "sah_bfs"]
            .iter()
            .map(|n| BuildPreset::from_name(n))
            .collect()
    }

    fn count_leaves(pairs: &[BvhNodePair]) -> usize {
        pairs
            .iter()
            .flat_map(|p| [p.left, p.right])
            .filter(|n| n.is_leaf())
            .count()
    }

    #[test]
    fn test_pair_count_invariant() {
        for preset in all_presets() {
            for n in [2usize, 3, 7, 100] {
                let tree = build_bvh_pairs(&boxes_grid(n), preset);
                assert_eq!(tree.pairs.len(), n - 1, "n={n} preset={preset:?}");
                assert_eq!(count_leaves(&tree.pairs), n);
                assert!(is_permutation(&tree.leaf_order));
            }
        }
    }

    #[test]
    fn test_single_box_padded() {
        let tree = build_bvh_pairs(&boxes_grid(1), BuildPreset::default());
        assert_eq!(tree.pairs.len(), 1);
        assert_eq!(tree.leaf_order.len(), 2);
        assert_eq!(tree.leaf_order[0], tree.leaf_order[1]);
    }

    #[test]
    fn test_leaf_slots_unique() {
        let tree = build_bvh_pairs(&boxes_grid(50), BuildPreset::default());
        let mut slots: Vec<u32> = tree
            .pairs
            .iter()
            .flat_map(|p| [p.left, p.right])
            .filter(|n| n.is_leaf())
            .map(|n| {
                assert_eq!(extract_count(n.left_offset), 1);
                extract_start(n.left_offset)
            })
            .collect();
        slots.sort_unstable();
        let expect: Vec<u32> = (0..50).collect();
        assert_eq!(slots, expect);
    }

    #[test]
    fn test_leaf_union_matches_input_union() {
        let boxes = boxes_grid(64);
        let mut input_union = Aabb::empty();
        for b in &boxes {
            input_union = input_union.merged(b);
        }
        for preset in all_presets() {
            let tree = build_bvh_pairs(&boxes, preset);
            let mut leaf_union = Aabb::empty();
            for p in &tree.pairs {
                for n in [p.left, p.right] {
                    if n.is_leaf() {
                        leaf_union = leaf_union.merged(&n.bounds());
                    }
                }
            }
            assert!((leaf_union.min - input_union.min).length() < 1e-5);
            assert!((leaf_union.max - input_union.max).length() < 1e-5);
        }
    }

    #[test]
    fn test_children_contained_in_parent() {
        let tree = build_bvh_pairs(&boxes_grid(40), BuildPreset::default());
        for p in &tree.pairs {
            for n in [p.left, p.right] {
                if !n.is_leaf() {
                    let child = &tree.pairs[n.left_offset as usize];
                    let union = child.left.bounds().merged(&child.right.bounds());
                    assert!(n.box_min.cmple(union.min + 1e-5).all());
                    assert!(n.box_max.cmpge(union.max - 1e-5).all());
                }
            }
        }
    }

    #[test]
    fn test_flat_escape_chain_visits_all_leaves() {
        let boxes = boxes_grid(33);
        let nodes = build_bvh_flat(&boxes, BuildPreset::default());
        assert_eq!(nodes.len(), 2 * boxes.len() - 1);

        // walk the escape chain as if every box test hit
        let mut seen = vec![false; boxes.len()];
        let mut idx = 0u32;
        loop {
            let n = nodes[idx as usize];
            if n.is_leaf() {
                let inst = (n.left_offset & !LEAF_BIT) as usize;
                assert!(!seen[inst]);
                seen[inst] = true;
                idx = n.escape_index;
            } else {
                idx = n.left_offset;
            }
            if idx == ESCAPE_END {
                break;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_deterministic_rebuild() {
        let boxes = boxes_grid(77);
        for preset in all_presets() {
            let a = build_bvh_pairs(&boxes, preset);
            let b = build_bvh_pairs(&boxes, preset);
            assert_eq!(a.pairs, b.pairs);
            assert_eq!(a.leaf_order, b.leaf_order);
        }
    }

    #[test]
    fn test_identical_boxes_still_valid() {
        let boxes = vec![Aabb::new(Vec3::ZERO, Vec3::ONE); 9];
        let tree = build_bvh_pairs(&boxes, BuildPreset::default());
        assert_eq!(tree.pairs.len(), 8);
        assert_eq!(count_leaves(&tree.pairs), 9);
        assert!(is_permutation(&tree.leaf_order));
    }
}
