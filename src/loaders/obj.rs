//! Wavefront OBJ adapter (geometry only, MTL libraries are not fetched).

use anyhow::{bail, Context, Result};
use glam::Vec3;
use log::debug;

use super::{decode_text, resolved, FormatAdapter, ParseFuture};
use crate::dispatch::ModelFormat;
use crate::material::{Material, MaterialLibrary};
use crate::scene::{Geometry, MaterialSlot, Model, SceneNode};

pub struct ObjAdapter;

impl FormatAdapter for ObjAdapter {
    fn name(&self) -> &'static str {
        "OBJ"
    }

    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a> {
        resolved(ModelFormat::Obj, parse_obj(&decode_text(bytes)))
    }
}

/// Parses OBJ text into one mesh per object, each with its own white Phong material
pub fn parse_obj(text: &str) -> Result<Model> {
    let load_opts = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj_buf(&mut text.as_bytes(), &load_opts, |_| {
        Ok((Vec::new(), Default::default()))
    })
    .context("Failed to parse OBJ data")?;

    let mut root = SceneNode::group("");
    let mut materials = MaterialLibrary::new();

    for model in models {
        let mesh = model.mesh;

        let positions: Vec<Vec3> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();

        let normals = if !mesh.normals.is_empty() && mesh.normals.len() == mesh.positions.len() {
            Some(
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2]))
                    .collect(),
            )
        } else {
            None
        };

        let indices = if mesh.indices.is_empty() {
            None
        } else {
            if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= positions.len()) {
                bail!("OBJ object {:?} references missing vertex {}", model.name, bad);
            }
            Some(mesh.indices)
        };

        debug!(
            "OBJ object {:?}: {} vertices, {} indices",
            model.name,
            positions.len(),
            indices.as_ref().map_or(0, Vec::len)
        );

        let material = materials.add(Material::phong([1.0, 1.0, 1.0], 30.0));
        let geometry = Geometry {
            normals,
            ..Geometry::triangles(positions, indices)
        };
        root.add_child(SceneNode::mesh(model.name, geometry, MaterialSlot::Single(material)));
    }

    Ok(Model::with_materials(root, materials))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quad_is_triangulated() {
        let text = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let model = parse_obj(text).unwrap();
        assert_eq!(model.root.children.len(), 1);

        let node = &model.root.children[0];
        assert_eq!(node.name, "quad");
        let mesh = node.mesh.as_ref().unwrap();
        assert_eq!(mesh.geometry.positions.len(), 4);
        assert_eq!(mesh.geometry.indices.as_ref().map(Vec::len), Some(6));
        assert!(mesh.geometry.normals.is_none());
    }

    #[test]
    fn test_each_object_gets_its_own_material() {
        let text = "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no b\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n";
        let model = parse_obj(text).unwrap();
        assert_eq!(model.root.children.len(), 2);
        assert_eq!(model.materials.len(), 2);
    }

    #[test]
    fn test_malformed_vertex_fails() {
        assert!(parse_obj("v one two three\nf 1 2 3\n").is_err());
    }
}
