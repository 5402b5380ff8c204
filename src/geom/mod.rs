//! Geometry payload types: triangle meshes and the SDF / radiance-field /
//! splat representations, with their packed record layouts and field
//! evaluation routines.

pub mod mesh;
pub mod grid;
pub mod octree;
pub mod svs;
pub mod sbs;
pub mod hp;
pub mod rf;
pub mod splat;

pub use mesh::MeshView;
pub use grid::SdfGridView;
pub use octree::{SdfOctreeNode, SdfFrameOctreeNode};
pub use svs::SdfSvsNode;
pub use sbs::{SdfSbsHeader, SdfSbsNode, SdfSbsView};
pub use hp::{HpOctreeNode, HpOctreeView};
pub use rf::{RfGridView, RF_CELL_SIZE};
pub use splat::GsSplat;

/// Hard ceiling on any single appended payload, in elements
pub const MAX_PAYLOAD: usize = 1 << 28;

/// Representation tag stored per geometry
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeomType {
    TriangleMesh = 0,
    SdfGrid = 1,
    SdfOctree = 2,
    SdfFrameOctree = 3,
    SdfSvs = 4,
    SdfSbs = 5,
    /// SBS stored brick-per-leaf: each BLAS leaf walks a whole brick
    SdfSbsSingleNode = 6,
    SdfHpOctree = 7,
    RfGrid = 8,
    GaussianSplats = 9,
}

impl GeomType {
    pub fn from_u32(v: u32) -> Option<GeomType> {
        Some(match v {
            0 => GeomType::TriangleMesh,
            1 => GeomType::SdfGrid,
            2 => GeomType::SdfOctree,
            3 => GeomType::SdfFrameOctree,
            4 => GeomType::SdfSvs,
            5 => GeomType::SdfSbs,
            6 => GeomType::SdfSbsSingleNode,
            7 => GeomType::SdfHpOctree,
            8 => GeomType::RfGrid,
            9 => GeomType::GaussianSplats,
            _ => return None,
        })
    }
}
