use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use log::{debug, info};

use super::{FormatAdapter, ParseFuture};
use crate::dispatch::ModelFormat;
use crate::error::LoadError;
use crate::material::{Material, MaterialId, MaterialLibrary};
use crate::scene::{Geometry, MaterialSlot, Model, SceneNode, Transform};

/// glTF 2.0 adapter, handles both JSON `.gltf` with embedded buffers and binary `.glb`.
/// `format` is the extension it was registered for and names it in errors.
pub struct GltfAdapter {
    pub format: ModelFormat,
}

impl GltfAdapter {
    pub fn new(format: ModelFormat) -> Self {
        Self { format }
    }
}

impl FormatAdapter for GltfAdapter {
    fn name(&self) -> &'static str {
        "glTF"
    }

    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a> {
        Box::pin(async move {
            parse_gltf(bytes).map_err(|reason| LoadError::parse(self.format, reason))
        })
    }
}

/// Material bookkeeping while walking one document
struct MaterialTable {
    library: MaterialLibrary,
    by_index: Vec<MaterialId>,
    fallback: Option<MaterialId>,
}

impl MaterialTable {
    fn resolve(&mut self, index: Option<usize>) -> Result<MaterialId> {
        match index {
            Some(i) => self
                .by_index
                .get(i)
                .copied()
                .with_context(|| format!("Primitive references missing material {}", i)),
            None => {
                let library = &mut self.library;
                Ok(*self.fallback.get_or_insert_with(|| {
                    library.add(Material::standard([1.0, 1.0, 1.0], 1.0, 1.0))
                }))
            }
        }
    }
}

/// Parses a glTF or GLB document held in memory.
///
/// External buffer or image URIs cannot be resolved from a byte slice and fail the parse.
pub fn parse_gltf(bytes: &[u8]) -> Result<Model> {
    let (gltf, buffers, _images) =
        gltf::import_slice(bytes).context("Failed to import glTF data")?;

    debug!(
        "glTF document: {} scenes, {} nodes, {} meshes, {} materials",
        gltf.scenes().count(),
        gltf.nodes().count(),
        gltf.meshes().count(),
        gltf.materials().count()
    );

    let mut library = MaterialLibrary::new();
    let by_index = gltf
        .materials()
        .map(|material| library.add(convert_material(&material)))
        .collect();
    let mut materials = MaterialTable {
        library,
        by_index,
        fallback: None,
    };

    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    let mut root = SceneNode::group(scene.as_ref().and_then(|s| s.name()).unwrap_or("Scene"));

    if let Some(scene) = scene {
        for node in scene.nodes() {
            root.add_child(process_node(&node, &buffers, &mut materials)?);
        }
    }

    info!("Extracted {} meshes from glTF", root.mesh_count());
    Ok(Model::with_materials(root, materials.library))
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let base = pbr.base_color_factor();
    let mut converted = Material::standard(
        [base[0], base[1], base[2]],
        pbr.metallic_factor(),
        pbr.roughness_factor(),
    );
    converted.name = material.name().map(str::to_string);
    converted.opacity = base[3];
    converted.transparent = material.alpha_mode() == gltf::material::AlphaMode::Blend;
    converted
}

/// Recursively converts a glTF node, keeping its local transform
fn process_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    materials: &mut MaterialTable,
) -> Result<SceneNode> {
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut scene_node = SceneNode::group(node.name().unwrap_or("")).with_transform(Transform {
        translation: Vec3::from_array(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from_array(scale),
    });

    if let Some(mesh) = node.mesh() {
        process_mesh(&mesh, buffers, materials, &mut scene_node)?;
    }

    for child in node.children() {
        scene_node.add_child(process_node(&child, buffers, materials)?);
    }

    Ok(scene_node)
}

/// Adds one mesh node per triangle primitive of `mesh` under `parent`
fn process_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    materials: &mut MaterialTable,
    parent: &mut SceneNode,
) -> Result<()> {
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            debug!("Skipping {:?} primitive in mesh {:?}", primitive.mode(), mesh.name());
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .context("Mesh primitive has no positions")?
            .map(Vec3::from_array)
            .collect();

        let normals: Option<Vec<Vec3>> = reader
            .read_normals()
            .map(|normals| normals.map(Vec3::from_array).collect());

        let indices: Option<Vec<u32>> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect());

        let material = materials.resolve(primitive.material().index())?;

        let geometry = Geometry {
            normals,
            ..Geometry::triangles(positions, indices)
        };
        parent.add_child(SceneNode::mesh(
            mesh.name().unwrap_or(""),
            geometry,
            MaterialSlot::Single(material),
        ));
    }

    Ok(())
}
