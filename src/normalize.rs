//! Puts every displayed model into the same frame: materials and normals
//! filled in, shadows on, longest side scaled to the configured target size
//! and the bounding box centered on the origin.

use glam::Vec3;
use log::debug;

use crate::config::ViewerConfig;
use crate::math::AABB;
use crate::scene::{MaterialSlot, Model};

/// What `normalize` did to the root node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeReport {
    /// Uniform scale now on the root; 1.0 when the model had no extent
    pub scale: f32,
    /// World-space center before scaling
    pub center: Vec3,
    /// World-space bounds before scaling
    pub bounds: AABB,
}

pub fn normalize(model: &mut Model, config: &ViewerConfig) -> NormalizeReport {
    let materials = &mut model.materials;
    model.root.traverse_mut(&mut |node| {
        let Some(mesh) = node.mesh.as_mut() else {
            return;
        };
        if mesh.material.is_missing() {
            mesh.material = MaterialSlot::Single(materials.add(config.default_material()));
        }
        node.cast_shadow = true;
        node.receive_shadow = true;
        if !mesh.geometry.positions.is_empty() && !mesh.geometry.has_normals() {
            mesh.geometry.compute_vertex_normals();
        }
    });

    let bounds = model.root.world_bounds();
    let center = bounds.center();
    let max_dim = bounds.max_extent();

    if max_dim > 0.0 {
        model.root.transform.scale = Vec3::splat(config.target_size / max_dim);
    }
    let scale = model.root.transform.scale.x;
    model.root.transform.translation -= center * scale;

    debug!(
        "Normalized model: extent {:.3}, center {:?}, scale {:.4}",
        max_dim, center, scale
    );

    NormalizeReport {
        scale,
        center,
        bounds,
    }
}
