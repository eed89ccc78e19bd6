//! Where the example model comes from.
//!
//! The example chain is tried in order by the session; fetching is behind
//! [`SourceFetcher`] so the chain can run offline or against canned bytes.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dispatch::ModelFormat;
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Remote(url) => f.write_str(url),
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSource {
    pub name: String,
    pub location: SourceLocation,
    pub format: ModelFormat,
}

impl ExampleSource {
    pub fn remote(name: impl Into<String>, url: impl Into<String>, format: ModelFormat) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::Remote(url.into()),
            format,
        }
    }

    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>, format: ModelFormat) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::Local(path.into()),
            format,
        }
    }
}

/// Two hosted samples first, then the models shipped next to the site
pub fn default_example_sources() -> Vec<ExampleSource> {
    vec![
        ExampleSource::remote(
            "Damaged Helmet (GLTF)",
            "https://threejs.org/examples/models/gltf/DamagedHelmet/DamagedHelmet.gltf",
            ModelFormat::Gltf,
        ),
        ExampleSource::remote(
            "Character Model (OBJ)",
            "https://raw.githubusercontent.com/mrdoob/three.js/dev/examples/models/obj/male02/male02.obj",
            ModelFormat::Obj,
        ),
        ExampleSource::local(
            "Single Fuel Cell Car.fbx",
            "./Single+Fuel+Cell+Car.fbx",
            ModelFormat::Fbx,
        ),
        ExampleSource::local(
            "Fuel Cell Car.obj",
            "./fuelcellCarCAD_optimized.obj",
            ModelFormat::Obj,
        ),
    ]
}

/// Produces the raw bytes of one example source
pub trait SourceFetcher {
    fn fetch(&self, source: &ExampleSource) -> Result<Vec<u8>, LoadError>;
}

fn read_local(path: &PathBuf) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|e| LoadError::io(path.clone(), e))
}

/// Local files from disk, remote ones over HTTP(S)
#[derive(Debug, Default)]
pub struct DefaultFetcher;

impl SourceFetcher for DefaultFetcher {
    fn fetch(&self, source: &ExampleSource) -> Result<Vec<u8>, LoadError> {
        match &source.location {
            SourceLocation::Local(path) => read_local(path),
            SourceLocation::Remote(url) => {
                info!("Fetching {} from {}", source.name, url);
                let response =
                    reqwest::blocking::get(url).map_err(|e| LoadError::network(url, e))?;
                if !response.status().is_success() {
                    return Err(LoadError::network(
                        url,
                        format!("HTTP status {}", response.status()),
                    ));
                }
                let bytes = response.bytes().map_err(|e| LoadError::network(url, e))?;
                debug!("Fetched {} bytes from {}", bytes.len(), url);
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Never touches the network; remote sources fail immediately
#[derive(Debug, Default)]
pub struct OfflineFetcher;

impl SourceFetcher for OfflineFetcher {
    fn fetch(&self, source: &ExampleSource) -> Result<Vec<u8>, LoadError> {
        match &source.location {
            SourceLocation::Local(path) => read_local(path),
            SourceLocation::Remote(url) => Err(LoadError::network(url, "offline mode")),
        }
    }
}
