use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::LoadError;
use crate::loaders::{
    DaeAdapter, FbxAdapter, FormatAdapter, GltfAdapter, ObjAdapter, PlyAdapter, StlAdapter,
    ThreeMfAdapter,
};
use crate::scene::Model;

/// File formats the viewer knows by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Gltf,
    Glb,
    Fbx,
    Obj,
    Stl,
    Ply,
    Dae,
    #[serde(rename = "3mf")]
    ThreeMf,
}

impl ModelFormat {
    pub const ALL: [ModelFormat; 8] = [
        ModelFormat::Gltf,
        ModelFormat::Glb,
        ModelFormat::Fbx,
        ModelFormat::Obj,
        ModelFormat::Stl,
        ModelFormat::Ply,
        ModelFormat::Dae,
        ModelFormat::ThreeMf,
    ];

    pub const fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Gltf => "gltf",
            ModelFormat::Glb => "glb",
            ModelFormat::Fbx => "fbx",
            ModelFormat::Obj => "obj",
            ModelFormat::Stl => "stl",
            ModelFormat::Ply => "ply",
            ModelFormat::Dae => "dae",
            ModelFormat::ThreeMf => "3mf",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == extension)
    }

    /// Picks the format from the text after the last `.` of `filename`
    pub fn from_filename(filename: &str) -> Result<Self, LoadError> {
        let extension = extension_of(filename);
        Self::from_extension(&extension).ok_or(LoadError::UnsupportedFormat(extension))
    }

    /// OBJ and COLLADA parsers take decoded text; everything else takes raw bytes
    pub const fn is_text(&self) -> bool {
        matches!(self, ModelFormat::Obj | ModelFormat::Dae)
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

/// Lowercased text after the last `.`; a name without a dot is its own extension
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase()
}

/// Extension → adapter lookup table
#[derive(Clone, Default)]
pub struct Dispatcher {
    adapters: HashMap<ModelFormat, Arc<dyn FormatAdapter>>,
}

impl Dispatcher {
    /// A dispatcher with no adapters; every lookup fails until `register` is called
    pub fn empty() -> Self {
        Self::default()
    }

    /// A dispatcher wired to the built-in adapter for every known format
    pub fn new() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.register(ModelFormat::Gltf, Arc::new(GltfAdapter::new(ModelFormat::Gltf)));
        dispatcher.register(ModelFormat::Glb, Arc::new(GltfAdapter::new(ModelFormat::Glb)));
        dispatcher.register(ModelFormat::Fbx, Arc::new(FbxAdapter));
        dispatcher.register(ModelFormat::Obj, Arc::new(ObjAdapter));
        dispatcher.register(ModelFormat::Stl, Arc::new(StlAdapter));
        dispatcher.register(ModelFormat::Ply, Arc::new(PlyAdapter));
        dispatcher.register(ModelFormat::Dae, Arc::new(DaeAdapter));
        dispatcher.register(ModelFormat::ThreeMf, Arc::new(ThreeMfAdapter));
        dispatcher
    }

    pub fn register(&mut self, format: ModelFormat, adapter: Arc<dyn FormatAdapter>) {
        self.adapters.insert(format, adapter);
    }

    pub fn adapter(&self, format: ModelFormat) -> Result<&dyn FormatAdapter, LoadError> {
        self.adapters
            .get(&format)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| LoadError::UnsupportedFormat(format.extension().to_string()))
    }

    /// Resolves `filename` to exactly one adapter, or `UnsupportedFormat`
    pub fn select(&self, filename: &str) -> Result<(ModelFormat, &dyn FormatAdapter), LoadError> {
        let format = ModelFormat::from_filename(filename)?;
        Ok((format, self.adapter(format)?))
    }

    /// Parses `bytes` with the adapter chosen by `filename`. One attempt, no retry.
    pub async fn load(&self, filename: &str, bytes: &[u8]) -> Result<Model, LoadError> {
        let (format, adapter) = self.select(filename)?;
        log::debug!("Dispatching {} to the {} adapter", filename, format);
        adapter.parse(bytes).await
    }

    /// Parses `bytes` as a known format, skipping extension inference
    pub async fn load_as(&self, format: ModelFormat, bytes: &[u8]) -> Result<Model, LoadError> {
        self.adapter(format)?.parse(bytes).await
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<_> = self.adapters.keys().map(|k| k.extension()).collect();
        formats.sort_unstable();
        f.debug_struct("Dispatcher").field("formats", &formats).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased_suffix_after_last_dot() {
        assert_eq!(extension_of("Robot.Arm.STL"), "stl");
        assert_eq!(extension_of("scene.gltf"), "gltf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "readme");
    }

    #[test]
    fn test_every_known_extension_round_trips() {
        for format in ModelFormat::ALL {
            assert_eq!(ModelFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        match ModelFormat::from_filename("drawing.dwg") {
            Err(LoadError::UnsupportedFormat(ext)) => assert_eq!(ext, "dwg"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_text_formats() {
        assert!(ModelFormat::Obj.is_text());
        assert!(ModelFormat::Dae.is_text());
        assert!(!ModelFormat::Glb.is_text());
        assert!(!ModelFormat::Stl.is_text());
    }

    #[test]
    fn test_builtin_dispatcher_covers_all_formats() {
        let dispatcher = Dispatcher::new();
        for format in ModelFormat::ALL {
            assert!(dispatcher.adapter(format).is_ok(), "missing adapter for {}", format);
        }
    }

    #[test]
    fn test_format_serde_names() {
        let json = serde_json::to_string(&ModelFormat::ThreeMf).unwrap();
        assert_eq!(json, "\"3mf\"");
        let format: ModelFormat = serde_json::from_str("\"glb\"").unwrap();
        assert_eq!(format, ModelFormat::Glb);
    }
}
