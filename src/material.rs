use crate::math::hex_to_rgb;

/// Index of a material inside its model's `MaterialLibrary`.
///
/// Two meshes share a material exactly when they hold the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Lighting model of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Phong,
    Lambert,
    /// Metallic/roughness PBR, as produced by glTF
    Standard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub kind: MaterialKind,
    pub color: [f32; 3],
    pub shininess: f32,
    /// Only PBR materials carry metalness and roughness
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub flat_shading: bool,
}

impl Material {
    pub fn phong(color: [f32; 3], shininess: f32) -> Self {
        Self {
            name: None,
            kind: MaterialKind::Phong,
            color,
            shininess,
            metalness: None,
            roughness: None,
            opacity: 1.0,
            transparent: false,
            wireframe: false,
            flat_shading: false,
        }
    }

    pub fn phong_hex(hex: u32, shininess: f32) -> Self {
        Self::phong(hex_to_rgb(hex), shininess)
    }

    pub fn standard(color: [f32; 3], metalness: f32, roughness: f32) -> Self {
        Self {
            kind: MaterialKind::Standard,
            metalness: Some(metalness),
            roughness: Some(roughness),
            ..Self::phong(color, 30.0)
        }
    }
}

/// Arena of materials owned by a model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, m)| (MaterialId(i as u32), m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_hands_out_sequential_ids() {
        let mut library = MaterialLibrary::new();
        let a = library.add(Material::phong_hex(0xff0000, 30.0));
        let b = library.add(Material::phong_hex(0x00ff00, 30.0));
        assert_ne!(a, b);
        assert_eq!(library.len(), 2);
        assert_eq!(library.get(b).map(|m| m.color), Some([0.0, 1.0, 0.0]));
        assert!(library.get(MaterialId(7)).is_none());
    }

    #[test]
    fn test_standard_material_has_pbr_factors() {
        let material = Material::standard([1.0; 3], 0.5, 0.25);
        assert_eq!(material.kind, MaterialKind::Standard);
        assert_eq!(material.metalness, Some(0.5));
        assert_eq!(material.roughness, Some(0.25));

        let phong = Material::phong([1.0; 3], 30.0);
        assert_eq!(phong.metalness, None);
    }
}
