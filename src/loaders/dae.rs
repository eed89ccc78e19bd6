//! COLLADA adapter built on `dae-parser`.
//!
//! The instantiated visual scene is walked: each scene node keeps its
//! transform stack as a local TRS and each `instance_geometry` under it becomes
//! a mesh node. Documents without a scene fall back to one mesh node per
//! library geometry. Triangle and polylist primitives are read; materials are
//! not.

use anyhow::{anyhow, ensure, Context, Result};
use dae::source::{SourceReader, ST, XYZ};
use dae_parser as dae;
use glam::{Mat4, Vec3};
use log::{debug, warn};

use super::{decode_text, resolved, triangulate_fan, FormatAdapter, ParseFuture};
use crate::dispatch::ModelFormat;
use crate::scene::{Geometry, MaterialSlot, Model, SceneNode, Transform};

/// Deepest scene node nesting accepted
const MAX_DEPTH: usize = 64;

pub struct DaeAdapter;

impl FormatAdapter for DaeAdapter {
    fn name(&self) -> &'static str {
        "COLLADA"
    }

    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a> {
        resolved(ModelFormat::Dae, parse_dae(&decode_text(bytes)))
    }
}

/// One corner of a primitive, reduced to its position index
#[derive(Clone)]
struct Corner {
    position: u32,
}

impl<'a> dae::geom::VertexLoad<'a, ()> for Corner {
    fn position(_: &(), _: &SourceReader<'a, XYZ>, index: u32) -> Self {
        Corner { position: index }
    }

    fn add_normal(&mut self, _: &(), _: &SourceReader<'a, XYZ>, _: u32) {}

    fn add_texcoord(&mut self, _: &(), _: &SourceReader<'a, ST>, _: u32, _: Option<u32>) {}
}

pub fn parse_dae(text: &str) -> Result<Model> {
    let document = dae::Document::from_reader(text.as_bytes())
        .map_err(|e| anyhow!("Invalid COLLADA document: {:?}", e))?;
    let maps = document.local_maps();

    let visual_scene: Option<&dae::VisualScene> = document
        .scene
        .as_ref()
        .and_then(|scene| scene.instance_visual_scene.as_ref())
        .and_then(|instance| maps.get(&instance.url));

    let mut root = SceneNode::group("");
    match visual_scene {
        Some(scene) => {
            for node in &scene.nodes {
                root.add_child(instantiate(node, &maps, 0)?);
            }
        }
        None => {
            debug!("COLLADA document has no visual scene, reading library geometries");
            for mesh in library_meshes(&document, &maps)? {
                root.add_child(mesh);
            }
        }
    }

    debug!("COLLADA: {} meshes", root.mesh_count());
    Ok(Model::new(root))
}

/// A scene node with its local transform, geometry instances and child nodes
fn instantiate(node: &dae::Node, maps: &dae::LocalMaps<'_>, depth: usize) -> Result<SceneNode> {
    ensure!(depth < MAX_DEPTH, "COLLADA nodes nest deeper than {}", MAX_DEPTH);

    let name = node
        .name
        .clone()
        .or_else(|| node.id.clone())
        .unwrap_or_default();
    let matrix = node.transform_as_matrix();
    let mut out = SceneNode::group(name.as_str())
        .with_transform(local_transform(Mat4::from_cols_slice(matrix.as_slice())));

    for instance in &node.instance_geometry {
        let geometry: Option<&dae::Geometry> = maps.get(&instance.url);
        let Some(geometry) = geometry else {
            warn!("COLLADA node {:?} instances a missing geometry, skipping", name);
            continue;
        };
        if let Some(mesh) = geometry_node(geometry, maps)? {
            out.add_child(mesh);
        }
    }
    for child in &node.children {
        out.add_child(instantiate(child, maps, depth + 1)?);
    }
    Ok(out)
}

fn local_transform(matrix: Mat4) -> Transform {
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
    Transform {
        translation,
        rotation,
        scale,
    }
}

fn library_meshes(document: &dae::Document, maps: &dae::LocalMaps<'_>) -> Result<Vec<SceneNode>> {
    let mut meshes = Vec::new();
    let mut first_error = None;
    document.for_each(|geometry: &dae::Geometry| {
        if first_error.is_some() {
            return;
        }
        match geometry_node(geometry, maps) {
            Ok(Some(mesh)) => meshes.push(mesh),
            Ok(None) => {}
            Err(e) => first_error = Some(e),
        }
    });
    match first_error {
        Some(e) => Err(e),
        None => Ok(meshes),
    }
}

/// `None` for geometries that are not meshes (splines, convex hulls)
fn geometry_node(geometry: &dae::Geometry, maps: &dae::LocalMaps<'_>) -> Result<Option<SceneNode>> {
    let name = geometry
        .name
        .clone()
        .or_else(|| geometry.id.clone())
        .unwrap_or_default();
    let Some(mesh) = geometry.element.as_mesh() else {
        warn!("COLLADA geometry {:?} is not a mesh, skipping", name);
        return Ok(None);
    };
    let converted = convert_mesh(mesh, maps).with_context(|| format!("COLLADA geometry {:?}", name))?;
    Ok(Some(SceneNode::mesh(name, converted, MaterialSlot::None)))
}

fn convert_mesh(mesh: &dae::Mesh, maps: &dae::LocalMaps<'_>) -> Result<Geometry> {
    let vertices = mesh
        .vertices
        .as_ref()
        .context("mesh has no <vertices>")?
        .importer(maps)
        .map_err(|e| anyhow!("{:?}", e))?;
    let positions: Vec<Vec3> = Clone::clone(
        vertices
            .position_importer()
            .context("mesh has no POSITION input")?,
    )
    .map(Vec3::from)
    .collect();

    let mut indices = Vec::new();
    for primitive in &mesh.elements {
        match primitive {
            dae::Primitive::Triangles(tris) => {
                let Some(prim) = tris.data.prim.as_ref() else {
                    continue;
                };
                let importer = tris
                    .importer(maps, vertices.clone())
                    .map_err(|e| anyhow!("{:?}", e))?;
                indices.extend(importer.read::<_, Corner>(&(), prim).map(|c| c.position));
            }
            dae::Primitive::PolyList(polys) => {
                let importer = polys
                    .importer(maps, vertices.clone())
                    .map_err(|e| anyhow!("{:?}", e))?;
                let mut corners = importer.read::<_, Corner>(&(), &polys.data.prim);
                for &count in &*polys.data.vcount {
                    let polygon: Vec<u32> = corners
                        .by_ref()
                        .take(count as usize)
                        .map(|c| c.position)
                        .collect();
                    triangulate_fan(&polygon, &mut indices);
                }
            }
            _ => debug!("Skipping unsupported COLLADA primitive"),
        }
    }

    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(anyhow!("primitive references missing vertex {}", bad));
    }

    Ok(Geometry::triangles(positions, Some(indices)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_DAE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <asset>
    <created>2024-01-01T00:00:00</created>
    <modified>2024-01-01T00:00:00</modified>
  </asset>
  <library_geometries>
    <geometry id="tri-mesh" name="tri">
      <mesh>
        <source id="tri-positions">
          <float_array id="tri-positions-array" count="9">0 0 0 1 0 0 0 1 0</float_array>
          <technique_common>
            <accessor source="#tri-positions-array" count="3" stride="3">
              <param name="X" type="float"/>
              <param name="Y" type="float"/>
              <param name="Z" type="float"/>
            </accessor>
          </technique_common>
        </source>
        <vertices id="tri-vertices">
          <input semantic="POSITION" source="#tri-positions"/>
        </vertices>
        <triangles count="1">
          <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
          <p>0 1 2</p>
        </triangles>
      </mesh>
    </geometry>
  </library_geometries>
</COLLADA>
"##;

    const SCENE_DAE: &str = r##"  <library_visual_scenes>
    <visual_scene id="Scene" name="Scene">
      <node id="base" name="Base">
        <translate>0 0 -4</translate>
        <instance_geometry url="#tri-mesh"/>
        <node id="arm" name="Arm">
          <translate>3 0 0</translate>
          <scale>2 2 2</scale>
          <instance_geometry url="#tri-mesh"/>
        </node>
      </node>
    </visual_scene>
  </library_visual_scenes>
  <scene>
    <instance_visual_scene url="#Scene"/>
  </scene>
</COLLADA>
"##;

    fn with_scene() -> String {
        TRIANGLE_DAE.replace("</COLLADA>\n", SCENE_DAE)
    }

    #[test]
    fn test_parse_triangle() {
        let model = parse_dae(TRIANGLE_DAE).unwrap();
        assert_eq!(model.root.children.len(), 1);

        let node = &model.root.children[0];
        assert_eq!(node.name, "tri");
        let mesh = node.mesh.as_ref().unwrap();
        assert_eq!(mesh.geometry.positions[1], Vec3::X);
        assert_eq!(mesh.geometry.indices, Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_visual_scene_places_instances() {
        let model = parse_dae(&with_scene()).unwrap();
        assert_eq!(model.root.mesh_count(), 2);

        let base = model.root.find("Base").unwrap();
        assert_eq!(base.transform.translation, Vec3::new(0.0, 0.0, -4.0));
        assert_eq!(base.children[0].name, "tri");

        let arm = model.root.find("Arm").unwrap();
        assert!((arm.transform.translation - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
        assert!((arm.transform.scale - Vec3::splat(2.0)).length() < 1e-5);

        // Arm copy spans x 3..5 before the base shift
        let bounds = model.root.world_bounds();
        assert!((bounds.max - Vec3::new(5.0, 2.0, -4.0)).length() < 1e-4);
        assert!((bounds.min - Vec3::new(0.0, 0.0, -4.0)).length() < 1e-4);
    }

    #[test]
    fn test_invalid_xml_fails() {
        assert!(parse_dae("<COLLADA><oops").is_err());
    }
}
