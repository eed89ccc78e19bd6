use base64::Engine as _;
use serde_json::{json, Value};

use crate::material::Material;
use crate::math::AABB;
use crate::scene::{Geometry, Model, SceneNode};

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;

/// Accumulates the single binary buffer and the views/accessors into it
#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    fn push_view(&mut self, bytes: &[u8], target: u32) -> usize {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
            "target": target,
        }));
        self.views.len() - 1
    }

    fn push_vec3(&mut self, values: &[[f32; 3]], with_bounds: bool) -> usize {
        let view = self.push_view(bytemuck::cast_slice(values), ARRAY_BUFFER);
        let mut accessor = json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": values.len(),
            "type": "VEC3",
        });
        if with_bounds {
            let bounds = AABB::from_points(values.iter().map(|&v| v.into()));
            accessor["min"] = json!(bounds.min.to_array());
            accessor["max"] = json!(bounds.max.to_array());
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn push_indices(&mut self, indices: &[u32]) -> usize {
        let view = self.push_view(bytemuck::cast_slice(indices), ELEMENT_ARRAY_BUFFER);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": UNSIGNED_INT,
            "count": indices.len(),
            "type": "SCALAR",
        }));
        self.accessors.len() - 1
    }
}

struct Document {
    buffer: BufferBuilder,
    nodes: Vec<Value>,
    meshes: Vec<Value>,
}

impl Document {
    fn add_mesh(&mut self, name: &str, geometry: &Geometry, material: Option<u32>) -> usize {
        let positions: Vec<[f32; 3]> = geometry.positions.iter().map(|p| p.to_array()).collect();
        let mut attributes = json!({ "POSITION": self.buffer.push_vec3(&positions, true) });
        if let Some(normals) = &geometry.normals {
            let normals: Vec<[f32; 3]> = normals.iter().map(|n| n.to_array()).collect();
            attributes["NORMAL"] = json!(self.buffer.push_vec3(&normals, false));
        }

        let mut primitive = json!({ "attributes": attributes, "mode": 4 });
        if let Some(indices) = &geometry.indices {
            primitive["indices"] = json!(self.buffer.push_indices(indices));
        }
        if let Some(material) = material {
            primitive["material"] = json!(material);
        }

        self.meshes.push(json!({ "name": name, "primitives": [primitive] }));
        self.meshes.len() - 1
    }

    /// Appends `node` and its subtree; returns the index of `node`
    fn add_node(&mut self, node: &SceneNode) -> usize {
        let index = self.nodes.len();
        let t = &node.transform;
        self.nodes.push(json!({
            "name": node.name,
            "translation": t.translation.to_array(),
            "rotation": t.rotation.to_array(),
            "scale": t.scale.to_array(),
        }));

        // An accessor needs at least one element and finite bounds
        if let Some(mesh) = node.mesh.as_ref().filter(|m| !m.geometry.positions.is_empty()) {
            let material = mesh.material.ids().first().map(|id| id.0);
            let mesh_index = self.add_mesh(&node.name, &mesh.geometry, material);
            self.nodes[index]["mesh"] = json!(mesh_index);
        }

        let children: Vec<usize> = node.children.iter().map(|c| self.add_node(c)).collect();
        if !children.is_empty() {
            self.nodes[index]["children"] = json!(children);
        }
        index
    }
}

fn material_json(material: &Material) -> Value {
    let [r, g, b] = material.color;
    let mut value = json!({
        "pbrMetallicRoughness": {
            "baseColorFactor": [r, g, b, material.opacity],
            "metallicFactor": material.metalness.unwrap_or(0.0),
            "roughnessFactor": material.roughness.unwrap_or(1.0),
        },
        "doubleSided": false,
    });
    if let Some(name) = &material.name {
        value["name"] = json!(name);
    }
    if material.transparent {
        value["alphaMode"] = json!("BLEND");
    }
    value
}

/// glTF 2.0 JSON with the vertex data embedded as one base64 buffer
pub fn export_gltf(model: &Model) -> Value {
    let mut document = Document {
        buffer: BufferBuilder::default(),
        nodes: Vec::new(),
        meshes: Vec::new(),
    };
    let root = document.add_node(&model.root);

    let materials: Vec<Value> = model.materials.iter().map(|(_, m)| material_json(m)).collect();
    let data = &document.buffer.data;
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(data)
    );

    let mut gltf = json!({
        "asset": { "version": "2.0", "generator": concat!("cad-viewer ", env!("CARGO_PKG_VERSION")) },
        "scene": 0,
        "scenes": [{ "nodes": [root] }],
        "nodes": document.nodes,
        "meshes": document.meshes,
        "materials": materials,
    });
    if !data.is_empty() {
        gltf["buffers"] = json!([{ "byteLength": data.len(), "uri": uri }]);
        gltf["bufferViews"] = json!(document.buffer.views);
        gltf["accessors"] = json!(document.buffer.accessors);
    }
    gltf
}
