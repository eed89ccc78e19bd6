// config.rs - Viewer constants and optional JSON overrides
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::material::Material;
use crate::sources::{default_example_sources, ExampleSource};

/// Longest axis of every displayed model after normalization
pub const TARGET_SIZE: f32 = 5.0;
/// Color given to meshes that arrive without a material
pub const DEFAULT_COLOR: u32 = 0x2563eb;
pub const DEFAULT_SHININESS: f32 = 30.0;
pub const SHADOW_MAP_SIZE: u32 = 2048;
pub const CAMERA_FOV_DEGREES: f32 = 75.0;

/// Environment variable naming a JSON config file, used when `--config` is absent
pub const CONFIG_ENV_VAR: &str = "CAD_VIEWER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub target_size: f32,
    pub default_color: u32,
    pub default_shininess: f32,
    pub shadow_map_size: u32,
    pub camera_fov: f32,
    /// Tried in order by `ViewerSession::load_example`
    pub example_sources: Vec<ExampleSource>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            target_size: TARGET_SIZE,
            default_color: DEFAULT_COLOR,
            default_shininess: DEFAULT_SHININESS,
            shadow_map_size: SHADOW_MAP_SIZE,
            camera_fov: CAMERA_FOV_DEGREES,
            example_sources: default_example_sources(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Explicit path first, then `CAD_VIEWER_CONFIG`, then the built-in defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(path) => Self::load(path),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    /// Fresh opaque material for meshes that have none
    pub fn default_material(&self) -> Material {
        Material::phong_hex(self.default_color, self.default_shininess)
    }
}
