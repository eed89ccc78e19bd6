//! Encoders that turn the current model into a downloadable file.

mod gltf;
mod obj;
mod stl;

use anyhow::Result;
use clap::ValueEnum;
use glam::{Mat3, Mat4, Vec3};

use crate::scene::{Model, SceneNode};

pub use self::gltf::export_gltf;
pub use self::obj::export_obj;
pub use self::stl::export_stl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ExportFormat {
    Stl,
    Obj,
    Gltf,
}

impl ExportFormat {
    pub const fn filename(&self) -> &'static str {
        match self {
            ExportFormat::Stl => "model.stl",
            ExportFormat::Obj => "model.obj",
            ExportFormat::Gltf => "model.gltf",
        }
    }

    pub const fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Stl => "application/sla",
            ExportFormat::Obj => "text/plain",
            ExportFormat::Gltf => "application/json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFormat::Stl => "STL",
            ExportFormat::Obj => "OBJ",
            ExportFormat::Gltf => "GLTF",
        };
        f.write_str(name)
    }
}

/// An encoded model plus what a browser would need to offer it as a download
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: &'static str,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn export_model(model: &Model, format: ExportFormat) -> Result<ExportArtifact> {
    let bytes = match format {
        ExportFormat::Stl => export_stl(model)?.into_bytes(),
        ExportFormat::Obj => export_obj(model)?.into_bytes(),
        ExportFormat::Gltf => serde_json::to_vec_pretty(&export_gltf(model))?,
    };
    Ok(ExportArtifact {
        filename: format.filename(),
        mime_type: format.mime_type(),
        bytes,
    })
}

/// A mesh flattened into world space, triangles only
struct WorldMesh {
    name: String,
    positions: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    triangles: Vec<[usize; 3]>,
}

fn world_meshes(root: &SceneNode) -> Vec<WorldMesh> {
    let mut meshes = Vec::new();
    root.traverse_world(&Mat4::IDENTITY, &mut |node, world| {
        let Some(mesh) = &node.mesh else {
            return;
        };
        let geometry = &mesh.geometry;
        let normal_matrix = Mat3::from_mat4(*world).inverse().transpose();
        meshes.push(WorldMesh {
            name: node.name.clone(),
            positions: geometry
                .positions
                .iter()
                .map(|&p| world.transform_point3(p))
                .collect(),
            normals: geometry.normals.as_ref().map(|normals| {
                normals
                    .iter()
                    .map(|&n| (normal_matrix * n).normalize_or_zero())
                    .collect()
            }),
            triangles: geometry.triangles_iter().collect(),
        });
    });
    meshes
}
