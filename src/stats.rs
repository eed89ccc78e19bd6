use serde::Serialize;
use std::collections::HashSet;

use crate::scene::Model;

/// Counts shown next to the viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub vertices: usize,
    pub faces: usize,
    pub objects: usize,
    pub materials: usize,
}

/// Walks every mesh of `model`. Faces come from the index count, or the
/// vertex count for unindexed geometry, divided by three and floored once
/// at the end.
pub fn compute_stats(model: &Model) -> ModelStats {
    let mut vertices = 0;
    let mut faces = 0.0f64;
    let mut objects = 0;
    let mut materials = HashSet::new();

    model.root.traverse(&mut |node| {
        let Some(mesh) = &node.mesh else {
            return;
        };
        objects += 1;
        vertices += mesh.geometry.positions.len();
        let corners = match &mesh.geometry.indices {
            Some(indices) => indices.len(),
            None => mesh.geometry.positions.len(),
        };
        faces += corners as f64 / 3.0;
        materials.extend(mesh.material.ids().iter().copied());
    });

    ModelStats {
        vertices,
        faces: faces.floor() as usize,
        objects,
        materials: materials.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialId;
    use crate::scene::{Geometry, MaterialSlot, SceneNode};
    use glam::Vec3;

    #[test]
    fn test_partial_faces_accumulate_before_flooring() {
        // Two meshes of 4 unindexed vertices: 4/3 + 4/3 floors to 2, not 1 + 1
        let mut root = SceneNode::group("root");
        for name in ["a", "b"] {
            let geometry = Geometry::triangles(vec![Vec3::ZERO; 4], None);
            root.add_child(SceneNode::mesh(name, geometry, MaterialSlot::Single(MaterialId(0))));
        }
        let stats = compute_stats(&Model::new(root));
        assert_eq!(stats.faces, 2);
        assert_eq!(stats.vertices, 8);
        assert_eq!(stats.objects, 2);
        assert_eq!(stats.materials, 1);
    }

    #[test]
    fn test_multi_material_counts_distinct_ids() {
        let geometry = Geometry::triangles(vec![Vec3::ZERO; 3], Some(vec![0, 1, 2, 0, 2, 1]));
        let slot = MaterialSlot::Multi(vec![MaterialId(0), MaterialId(1), MaterialId(0)]);
        let stats = compute_stats(&Model::new(SceneNode::mesh("m", geometry, slot)));
        assert_eq!(stats.faces, 2);
        assert_eq!(stats.materials, 2);
    }
}
