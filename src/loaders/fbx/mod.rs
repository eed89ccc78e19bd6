//! FBX adapter for binary and ASCII files.
//!
//! Both encodings are read into the same node tree. Meshes come from
//! `Objects/Geometry` records and are hung under the `Model` objects they are
//! connected to, each model keeping its local translation, rotation and
//! scaling. Materials, deformers and layer elements are skipped, so meshes
//! come out without a material.

mod ascii;
mod binary;

use anyhow::{ensure, Context, Result};
use glam::{Quat, Vec3};
use log::{debug, warn};
use std::collections::HashMap;

use super::{decode_text, resolved, triangulate_fan, FormatAdapter, ParseFuture};
use crate::dispatch::ModelFormat;
use crate::scene::{Geometry, MaterialSlot, Model, SceneNode, Transform};

/// Deepest node nesting either reader accepts
const MAX_DEPTH: usize = 64;

pub struct FbxAdapter;

impl FormatAdapter for FbxAdapter {
    fn name(&self) -> &'static str {
        "FBX"
    }

    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a> {
        resolved(ModelFormat::Fbx, parse_fbx(bytes))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            Property::I16(v) => Some(v as i64),
            Property::I32(v) => Some(v as i64),
            Property::I64(v) => Some(v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Property::F32(v) => Some(v as f64),
            Property::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Object ids are integers in 7.x and `Class::Name` strings in 6.x
    fn as_key(&self) -> Option<String> {
        self.as_i64()
            .map(|id| id.to_string())
            .or_else(|| self.as_str().map(str::to_string))
    }

    fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Property::F64Array(v) => Some(v.clone()),
            Property::F32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Property::I32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Property::I64Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Property::I32Array(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Property::I64Array(v) => Some(v.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    properties: Vec<Property>,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// A single array property, or a run of scalar numbers
    fn f64_values(&self) -> Option<Vec<f64>> {
        match self.properties.as_slice() {
            [single] if single.to_f64_vec().is_some() => single.to_f64_vec(),
            props => props.iter().map(Property::as_f64).collect(),
        }
    }

    fn i64_values(&self) -> Option<Vec<i64>> {
        match self.properties.as_slice() {
            [single] if single.to_i64_vec().is_some() => single.to_i64_vec(),
            props => props.iter().map(Property::as_i64).collect(),
        }
    }

    fn key(&self) -> Option<String> {
        self.properties.first().and_then(Property::as_key)
    }

    /// Binary names read `Name\0\x01Class`, ASCII ones `Class::Name`
    fn object_name(&self) -> String {
        let raw = self
            .properties
            .iter()
            .find_map(Property::as_str)
            .unwrap_or("");
        if let Some((name, _)) = raw.split_once("\0\x01") {
            name.to_string()
        } else if let Some((_, name)) = raw.split_once("::") {
            name.to_string()
        } else {
            raw.to_string()
        }
    }
}

/// Parses an FBX file, binary or ASCII, into a scene of model nodes and meshes
pub fn parse_fbx(bytes: &[u8]) -> Result<Model> {
    let nodes = if bytes.starts_with(binary::MAGIC) {
        binary::read_document(bytes)?
    } else {
        ascii::read_document(&decode_text(bytes))?
    };
    build_model(&nodes)
}

struct ModelObject<'a> {
    key: String,
    node: &'a Node,
    parent: Option<usize>,
    geometries: Vec<usize>,
}

fn build_model(nodes: &[Node]) -> Result<Model> {
    let objects = nodes
        .iter()
        .find(|n| n.name == "Objects")
        .context("FBX file has no Objects section")?;

    let mut models: Vec<ModelObject> = objects
        .children
        .iter()
        .filter(|n| n.name == "Model")
        .map(|node| ModelObject {
            key: node.key().unwrap_or_default(),
            node,
            parent: None,
            geometries: Vec::new(),
        })
        .collect();
    let geometries: Vec<(String, &Node)> = objects
        .children
        .iter()
        .filter(|n| n.name == "Geometry")
        .map(|node| (node.key().unwrap_or_default(), node))
        .collect();

    let model_index: HashMap<String, usize> = models
        .iter()
        .enumerate()
        .map(|(i, m)| (m.key.clone(), i))
        .collect();
    let geometry_index: HashMap<&str, usize> = geometries
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (key.as_str(), i))
        .collect();

    let mut attached = vec![false; geometries.len()];
    let mut model_links = Vec::new();
    for (child, parent) in object_links(nodes) {
        let Some(&parent) = model_index.get(parent.as_str()) else {
            continue;
        };
        if let Some(&geometry) = geometry_index.get(child.as_str()) {
            models[parent].geometries.push(geometry);
            attached[geometry] = true;
        } else if let Some(&model) = model_index.get(child.as_str()) {
            model_links.push((model, parent));
        }
    }
    for (model, parent) in model_links {
        if model != parent && models[model].parent.is_none() {
            models[model].parent = Some(parent);
        }
    }

    let mut converted = Vec::with_capacity(geometries.len());
    for (_, node) in &geometries {
        let name = node.object_name();
        converted.push(match convert_geometry(node) {
            Some(result) => Some(result.with_context(|| format!("FBX geometry {:?}", name))?),
            None => {
                warn!("FBX geometry {:?} has no mesh data, skipping", name);
                None
            }
        });
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); models.len()];
    let mut top_level = Vec::new();
    for (i, model) in models.iter().enumerate() {
        match model.parent {
            Some(parent) => children[parent].push(i),
            None => top_level.push(i),
        }
    }

    let tree = SceneTree {
        models: &models,
        children: &children,
        geometries: &converted,
    };
    let mut root = SceneNode::group("");
    for i in top_level {
        root.add_child(tree.build(i, 0)?);
    }
    for (i, geometry) in converted.iter().enumerate() {
        if let (false, Some(geometry)) = (attached[i], geometry) {
            let name = geometries[i].1.object_name();
            root.add_child(SceneNode::mesh(name, geometry.clone(), MaterialSlot::None));
        }
    }

    debug!(
        "FBX: {} models, {} meshes",
        models.len(),
        root.mesh_count()
    );
    Ok(Model::new(root))
}

/// `(child, parent)` keys of object-to-object connections
fn object_links(nodes: &[Node]) -> Vec<(String, String)> {
    let Some(connections) = nodes.iter().find(|n| n.name == "Connections") else {
        return Vec::new();
    };
    connections
        .children
        .iter()
        .filter(|c| c.name == "C" || c.name == "Connect")
        .filter_map(|c| match c.properties.as_slice() {
            [kind, child, parent, ..] if kind.as_str() == Some("OO") => {
                Some((child.as_key()?, parent.as_key()?))
            }
            _ => None,
        })
        .collect()
}

struct SceneTree<'a, 'n> {
    models: &'a [ModelObject<'n>],
    children: &'a [Vec<usize>],
    geometries: &'a [Option<Geometry>],
}

impl SceneTree<'_, '_> {
    fn build(&self, index: usize, depth: usize) -> Result<SceneNode> {
        ensure!(depth < MAX_DEPTH, "FBX model hierarchy is deeper than {}", MAX_DEPTH);
        let model = &self.models[index];
        let name = model.node.object_name();

        let mut meshes: Vec<Geometry> = model
            .geometries
            .iter()
            .filter_map(|&g| self.geometries[g].clone())
            .collect();
        // 6.x keeps the mesh inside the model itself
        if let Some(inline) = convert_geometry(model.node) {
            meshes.push(inline.with_context(|| format!("FBX model {:?}", name))?);
        }

        let mut node = if meshes.len() == 1 {
            SceneNode::mesh(name.as_str(), meshes.remove(0), MaterialSlot::None)
        } else {
            let mut group = SceneNode::group(name.as_str());
            for geometry in meshes {
                group.add_child(SceneNode::mesh(name.as_str(), geometry, MaterialSlot::None));
            }
            group
        };
        node.transform = model_transform(model.node);

        for &child in &self.children[index] {
            node.add_child(self.build(child, depth + 1)?);
        }
        Ok(node)
    }
}

/// Local TRS from a model's `Properties70` (7.x) or `Properties60` (6.x) block
fn model_transform(model: &Node) -> Transform {
    let mut transform = Transform::IDENTITY;
    let Some(block) = model
        .child("Properties70")
        .or_else(|| model.child("Properties60"))
    else {
        return transform;
    };

    let mut pre_rotation = Quat::IDENTITY;
    let mut rotation = Quat::IDENTITY;
    for entry in block.children.iter().filter(|c| c.name == "P" || c.name == "Property") {
        let (Some(name), Some(value)) = (
            entry.properties.first().and_then(Property::as_str),
            trailing_vec3(entry),
        ) else {
            continue;
        };
        match name {
            "Lcl Translation" => transform.translation = value,
            "Lcl Rotation" => rotation = euler_xyz_degrees(value),
            "PreRotation" => pre_rotation = euler_xyz_degrees(value),
            "Lcl Scaling" => transform.scale = value,
            _ => {}
        }
    }
    transform.rotation = pre_rotation * rotation;
    transform
}

fn trailing_vec3(entry: &Node) -> Option<Vec3> {
    let props = &entry.properties;
    let tail = props.get(props.len().checked_sub(3)?..)?;
    let [x, y, z] = [tail[0].as_f64()?, tail[1].as_f64()?, tail[2].as_f64()?];
    Some(Vec3::new(x as f32, y as f32, z as f32))
}

/// X applied first, then Y, then Z
fn euler_xyz_degrees(angles: Vec3) -> Quat {
    Quat::from_rotation_z(angles.z.to_radians())
        * Quat::from_rotation_y(angles.y.to_radians())
        * Quat::from_rotation_x(angles.x.to_radians())
}

fn convert_geometry(node: &Node) -> Option<Result<Geometry>> {
    let vertices = node.child("Vertices")?.f64_values()?;
    let polygon_indices = node.child("PolygonVertexIndex")?.i64_values()?;
    Some(build_geometry(&vertices, &polygon_indices))
}

/// Each polygon ends at a negative index holding the bitwise complement of its last vertex
fn build_geometry(vertices: &[f64], polygon_indices: &[i64]) -> Result<Geometry> {
    let positions: Vec<Vec3> = vertices
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect();

    let mut indices = Vec::new();
    let mut polygon = Vec::new();
    for &raw in polygon_indices {
        let (index, last) = if raw < 0 { (!raw, true) } else { (raw, false) };
        ensure!(
            (index as usize) < positions.len(),
            "polygon references missing vertex {}",
            index
        );
        polygon.push(index as u32);
        if last {
            triangulate_fan(&polygon, &mut indices);
            polygon.clear();
        }
    }

    Ok(Geometry::triangles(positions, Some(indices)))
}

#[cfg(test)]
mod tests {
    use super::binary::tests::{
        compressed_i32_array_prop, document, double_prop, f64_array_prop, long_prop,
        string_prop, TestNode,
    };
    use super::*;

    const QUAD: [f64; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];

    fn geometry_node(id: i64) -> TestNode {
        TestNode::new(
            "Geometry",
            vec![long_prop(id), string_prop("Plane\0\x01Geometry"), string_prop("Mesh")],
            vec![
                TestNode::new("Vertices", vec![f64_array_prop(&QUAD)], vec![]),
                TestNode::new(
                    "PolygonVertexIndex",
                    vec![compressed_i32_array_prop(&[0, 1, 2, !3])],
                    vec![],
                ),
            ],
        )
    }

    fn p_vec3(name: &str, v: [f64; 3]) -> TestNode {
        TestNode::new(
            "P",
            vec![
                string_prop(name),
                string_prop(name),
                string_prop(""),
                string_prop("A"),
                double_prop(v[0]),
                double_prop(v[1]),
                double_prop(v[2]),
            ],
            vec![],
        )
    }

    fn model_node(id: i64, name: &str, properties: Vec<TestNode>) -> TestNode {
        TestNode::new(
            "Model",
            vec![
                long_prop(id),
                string_prop(&format!("{}\0\x01Model", name)),
                string_prop("Mesh"),
            ],
            vec![TestNode::new("Properties70", vec![], properties)],
        )
    }

    fn link(child: i64, parent: i64) -> TestNode {
        TestNode::new("C", vec![string_prop("OO"), long_prop(child), long_prop(parent)], vec![])
    }

    #[test]
    fn test_parse_compressed_quad() {
        let bytes = document(&[TestNode::new("Objects", vec![], vec![geometry_node(42)])]);
        let model = parse_fbx(&bytes).unwrap();
        assert_eq!(model.root.children.len(), 1);

        let node = &model.root.children[0];
        assert_eq!(node.name, "Plane");
        let mesh = node.mesh.as_ref().unwrap();
        assert_eq!(mesh.geometry.positions.len(), 4);
        assert_eq!(mesh.geometry.indices, Some(vec![0, 1, 2, 0, 2, 3]));
        assert!(mesh.material.is_missing());
    }

    #[test]
    fn test_models_carry_local_transforms() {
        let objects = TestNode::new(
            "Objects",
            vec![],
            vec![
                geometry_node(1),
                model_node(
                    2,
                    "Body",
                    vec![
                        p_vec3("Lcl Translation", [10.0, 0.0, 0.0]),
                        p_vec3("Lcl Scaling", [2.0, 2.0, 2.0]),
                    ],
                ),
                model_node(3, "Arm", vec![p_vec3("Lcl Rotation", [0.0, 0.0, 90.0])]),
            ],
        );
        let connections = TestNode::new(
            "Connections",
            vec![],
            vec![link(2, 0), link(3, 2), link(1, 3)],
        );
        let model = parse_fbx(&document(&[objects, connections])).unwrap();

        assert_eq!(model.root.children.len(), 1);
        let body = &model.root.children[0];
        assert_eq!(body.name, "Body");
        assert!(body.mesh.is_none());
        assert_eq!(body.transform.translation, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(body.transform.scale, Vec3::splat(2.0));

        let arm = &body.children[0];
        assert_eq!(arm.name, "Arm");
        assert!(arm.mesh.is_some());
        let turned = arm.transform.rotation * Vec3::X;
        assert!((turned - Vec3::Y).length() < 1e-5);

        // Quad corner (1,0,0): arm turns it to (0,1,0), body scales and shifts it
        let bounds = model.root.world_bounds();
        assert!((bounds.max - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-4);
        assert!((bounds.min - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_ascii_file_with_connections() {
        let text = r#"; FBX 7.4.0 project file
FBXHeaderExtension:  {
	FBXHeaderVersion: 1003
}
Objects:  {
	Geometry: 100, "Geometry::Tri", "Mesh" {
		Vertices: *9 {
			a: 0,0,0,1,0,0,0,1,0
		}
		PolygonVertexIndex: *3 {
			a: 0,1,-3
		}
	}
	Model: 200, "Model::Part", "Mesh" {
		Version: 232
		Properties70:  {
			P: "Lcl Translation", "Lcl Translation", "", "A",0,5,0
		}
	}
}
Connections:  {
	;Model::Part, Model::RootNode
	C: "OO",200,0
	;Geometry::Tri, Model::Part
	C: "OO",100,200
}
"#;
        let model = parse_fbx(text.as_bytes()).unwrap();
        let part = model.root.find("Part").unwrap();
        assert_eq!(part.transform.translation, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(part.mesh.as_ref().unwrap().geometry.indices, Some(vec![0, 1, 2]));
        assert_eq!(model.root.world_bounds().min.y, 5.0);
    }

    #[test]
    fn test_ascii_6_inline_mesh() {
        let text = "; FBX 6.1.0 project file\nObjects:  {\n\tModel: \"Model::Cube\", \"Mesh\" {\n\t\tVertices: 0,0,0,1,0,0,\n\t\t\t0,1,0\n\t\tPolygonVertexIndex: 0,1,-3\n\t}\n}\nConnections:  {\n\tConnect: \"OO\", \"Model::Cube\", \"Model::Scene\"\n}\n";
        let model = parse_fbx(text.as_bytes()).unwrap();
        let cube = model.root.find("Cube").unwrap();
        assert_eq!(cube.mesh.as_ref().unwrap().geometry.positions.len(), 3);
    }

    #[test]
    fn test_truncated_file_fails() {
        let bytes = document(&[TestNode::new("Objects", vec![], vec![geometry_node(42)])]);
        assert!(parse_fbx(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_missing_objects_fails() {
        let err = parse_fbx(b"; FBX 7.4.0 project file\nFBXHeaderExtension: {\n}\n").unwrap_err();
        assert!(err.to_string().contains("Objects"));
    }

    #[test]
    fn test_polygon_index_out_of_range_fails() {
        assert!(build_geometry(&[0.0; 9], &[0, 1, !5]).is_err());
    }
}
