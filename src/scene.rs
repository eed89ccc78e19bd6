use glam::{Mat4, Quat, Vec3};

use crate::material::{MaterialId, MaterialLibrary};
use crate::math::AABB;

/// Local transform of a scene node, applied as scale, then rotation, then translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Where a geometry came from; procedural shapes keep their tag so they stay recognisable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Triangles,
    Box,
    Cylinder,
}

/// Triangle list geometry, optionally indexed
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub shape: Shape,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    pub fn triangles(positions: Vec<Vec3>, indices: Option<Vec<u32>>) -> Self {
        Self {
            shape: Shape::Triangles,
            positions,
            normals: None,
            indices,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Vertex index triples; unindexed geometry is read three positions at a time.
    /// Triples referencing missing vertices are skipped.
    pub fn triangles_iter(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let count = self.positions.len();
        let indexed = self.indices.as_deref().map(|indices| {
            indices
                .chunks_exact(3)
                .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
        });
        let unindexed = match indexed {
            Some(_) => None,
            None => Some((0..count / 3).map(|i| [3 * i, 3 * i + 1, 3 * i + 2])),
        };
        indexed
            .into_iter()
            .flatten()
            .chain(unindexed.into_iter().flatten())
            .filter(move |t| t.iter().all(|&i| i < count))
    }

    /// Fills in vertex normals from the triangles.
    ///
    /// Indexed geometry gets smooth normals, each vertex accumulating the
    /// area-weighted normals of its faces. Unindexed geometry gets one flat
    /// normal per face.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for [a, b, c] in self.triangles_iter() {
            let (pa, pb, pc) = (self.positions[a], self.positions[b], self.positions[c]);
            let face = (pc - pb).cross(pa - pb);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }

        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }

        self.normals = Some(normals);
    }
}

/// Which materials a mesh is drawn with
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MaterialSlot {
    #[default]
    None,
    Single(MaterialId),
    Multi(Vec<MaterialId>),
}

impl MaterialSlot {
    /// No material at all, or an empty material list
    pub fn is_missing(&self) -> bool {
        match self {
            MaterialSlot::None => true,
            MaterialSlot::Single(_) => false,
            MaterialSlot::Multi(ids) => ids.is_empty(),
        }
    }

    pub fn ids(&self) -> &[MaterialId] {
        match self {
            MaterialSlot::None => &[],
            MaterialSlot::Single(id) => std::slice::from_ref(id),
            MaterialSlot::Multi(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub geometry: Geometry,
    pub material: MaterialSlot,
}

/// A node of the displayed scene tree
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshData>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            mesh: None,
            cast_shadow: false,
            receive_shadow: false,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, geometry: Geometry, material: MaterialSlot) -> Self {
        Self {
            mesh: Some(MeshData { geometry, material }),
            ..Self::group(name)
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn is_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Depth-first, parent before children
    pub fn traverse<F: FnMut(&SceneNode)>(&self, f: &mut F) {
        f(self);
        for child in &self.children {
            child.traverse(f);
        }
    }

    pub fn traverse_mut<F: FnMut(&mut SceneNode)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            child.traverse_mut(f);
        }
    }

    /// Like `traverse`, also handing out each node's world matrix.
    /// `parent` is the world matrix of this node's parent.
    pub fn traverse_world<F: FnMut(&SceneNode, &Mat4)>(&self, parent: &Mat4, f: &mut F) {
        let world = *parent * self.transform.matrix();
        f(self, &world);
        for child in &self.children {
            child.traverse_world(&world, f);
        }
    }

    /// World-space bounds of every mesh vertex under this node, this node's own transform included
    pub fn world_bounds(&self) -> AABB {
        let mut bounds = AABB::empty();
        self.traverse_world(&Mat4::IDENTITY, &mut |node, world| {
            if let Some(mesh) = &node.mesh {
                bounds = bounds.union(&AABB::from_transformed_points(
                    &mesh.geometry.positions,
                    world,
                ));
            }
        });
        bounds
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |node| {
            if node.is_mesh() {
                count += 1;
            }
        });
        count
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// A parsed scene tree together with the materials its meshes refer to
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub root: SceneNode,
    pub materials: MaterialLibrary,
}

impl Model {
    pub fn new(root: SceneNode) -> Self {
        Self {
            root,
            materials: MaterialLibrary::new(),
        }
    }

    pub fn with_materials(root: SceneNode, materials: MaterialLibrary) -> Self {
        Self { root, materials }
    }
}
