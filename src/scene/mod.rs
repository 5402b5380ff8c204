//! Scene assembly: the geometry store, instance table and two-level BVH.

pub mod store;
pub mod instance;
pub mod extract;

pub use store::{GeomData, GeometryStore, StoreStats};
pub use instance::Instance;
pub use extract::RfPackMode;

use crate::bvh::BvhNode;
use crate::trace::preset::TracePreset;

/// A committed scene: geometry payloads plus instances under a TLAS.
///
/// Geometry is appended through [`GeometryStore`] methods on the `geom`
/// field, instances through [`Scene::add_instance`]; ray queries require a
/// [`Scene::commit`] after the instance set changes.
#[derive(Default)]
pub struct Scene {
    pub geom: GeometryStore,
    pub instances: Vec<Instance>,
    pub tlas: Vec<BvhNode>,
    pub trace: TracePreset,
}
