//! The instance table and TLAS commit.

use crate::bvh::{build_bvh_flat, BuildPreset, BvhNode, ESCAPE_END, LEAF_BIT, MAX_LEAVES};
use crate::core::error::Error;
use crate::core::types::Mat4;
use crate::core::Result;
use crate::math::Aabb;
use crate::scene::Scene;

/// One placed geometry: the transform pair, the world-space box of the
/// transformed geometry bounds, and the geometry it instantiates
#[derive(Clone, Copy, Debug)]
pub struct Instance {
    pub transform: Mat4,
    pub transform_inv: Mat4,
    /// For transforming surface normals back to world space
    pub transform_inv_transposed: Mat4,
    pub bounds: Aabb,
    pub geom_id: u32,
}

impl Instance {
    fn new(geom_id: u32, transform: Mat4, local_bounds: Aabb) -> Instance {
        let transform_inv = transform.inverse();
        Instance {
            transform,
            transform_inv,
            transform_inv_transposed: transform_inv.transpose(),
            bounds: local_bounds.transformed(&transform),
            geom_id,
        }
    }
}

impl Scene {
    /// Place `geom_id` under `transform`, returning the instance id.
    /// The TLAS is stale until the next [`Scene::commit`].
    pub fn add_instance(&mut self, geom_id: u32, transform: Mat4) -> Result<u32> {
        let bounds = self.geom.geom(geom_id)?.bounds();
        let inst_id = self.instances.len() as u32;
        self.instances.push(Instance::new(geom_id, transform, bounds));
        self.tlas.clear();
        Ok(inst_id)
    }

    /// Move an existing instance. An unknown id is logged and ignored so
    /// an animation loop driving many instances never aborts mid-frame.
    pub fn update_instance(&mut self, inst_id: u32, transform: Mat4) {
        let Some(inst) = self.instances.get_mut(inst_id as usize) else {
            log::warn!("update_instance: unknown instance {inst_id}, ignored");
            return;
        };
        let geom_id = inst.geom_id;
        let bounds = self.geom.geom_data[geom_id as usize].bounds();
        *inst = Instance::new(geom_id, transform, bounds);
        self.tlas.clear();
    }

    /// Drop all instances and the TLAS, keeping geometry payloads
    pub fn clear_instances(&mut self) {
        self.instances.clear();
        self.tlas.clear();
    }

    /// Drop geometry, instances and the TLAS, keeping presets
    pub fn clear(&mut self) {
        self.geom.clear();
        self.clear_instances();
    }

    /// Rebuild the TLAS over the current instance set
    pub fn commit(&mut self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(Error::EmptyScene);
        }
        if self.instances.len() > MAX_LEAVES {
            return Err(Error::PayloadTooLarge {
                what: "instances",
                count: self.instances.len(),
                limit: MAX_LEAVES,
            });
        }
        if self.instances.len() == 1 {
            // padding a one-box build would put a phantom instance in the
            // tree, so a single instance becomes a single leaf
            let b = self.instances[0].bounds;
            self.tlas = vec![BvhNode {
                box_min: b.min,
                left_offset: LEAF_BIT,
                box_max: b.max,
                escape_index: ESCAPE_END,
            }];
            return Ok(());
        }
        let boxes: Vec<Aabb> = self.instances.iter().map(|i| i.bounds).collect();
        self.tlas = build_bvh_flat(&boxes, BuildPreset::high_quality());
        log::debug!("TLAS: {} instances, {} nodes", boxes.len(), self.tlas.len());
        Ok(())
    }

    pub fn committed(&self) -> bool {
        !self.tlas.is_empty()
    }
}
