//! The viewer's one current model and everything done to it.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::path::Path;

use crate::camera::ViewCamera;
use crate::config::ViewerConfig;
use crate::dispatch::Dispatcher;
use crate::error::LoadError;
use crate::export::{export_model, ExportArtifact, ExportFormat};
use crate::material::{Material, MaterialKind};
use crate::normalize::normalize;
use crate::scene::Model;
use crate::scenes::create_example_robot;
use crate::sources::{SourceFetcher, SourceLocation};
use crate::stats::{compute_stats, ModelStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// History entry for every model that reached the display
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModelRecord {
    pub model_id: u64,
    pub source_name: String,
    pub loaded_at: DateTime<Utc>,
}

/// A named file's contents, as handed over by a file picker or drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Reads `path`, naming the file after its last path component
    pub fn read(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ShadingMode {
    Flat,
    Smooth,
    Phong,
    Lambert,
}

struct CurrentModel {
    id: u64,
    name: String,
    model: Model,
    stats: ModelStats,
}

pub struct ViewerSession {
    config: ViewerConfig,
    dispatcher: Dispatcher,
    current: Option<CurrentModel>,
    records: Vec<LoadedModelRecord>,
    notices: Vec<Notice>,
    camera: ViewCamera,
    wireframe: bool,
    next_id: u64,
}

impl ViewerSession {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_dispatcher(config, Dispatcher::new())
    }

    pub fn with_dispatcher(config: ViewerConfig, dispatcher: Dispatcher) -> Self {
        let camera = ViewCamera::new(config.camera_fov);
        Self {
            config,
            dispatcher,
            current: None,
            records: Vec::new(),
            notices: Vec::new(),
            camera,
            wireframe: false,
            next_id: 0,
        }
    }

    /// Normalizes `model` and makes it the current one, replacing any previous model
    pub fn display(&mut self, mut model: Model, name: &str) -> ModelStats {
        normalize(&mut model, &self.config);
        let stats = compute_stats(&model);

        let id = self.next_id;
        self.next_id += 1;
        self.records.push(LoadedModelRecord {
            model_id: id,
            source_name: name.to_string(),
            loaded_at: Utc::now(),
        });
        self.current = Some(CurrentModel {
            id,
            name: name.to_string(),
            model,
            stats,
        });
        self.wireframe = false;

        info!(
            "Displaying {}: {} vertices, {} faces, {} objects, {} materials",
            name, stats.vertices, stats.faces, stats.objects, stats.materials
        );
        stats
    }

    /// Dispatches on the extension of `name`, parses and displays. On error the
    /// current model is left as it was.
    pub async fn load_file(&mut self, name: &str, bytes: &[u8]) -> Result<ModelStats, LoadError> {
        let model = self.dispatcher.load(name, bytes).await?;
        Ok(self.display(model, name))
    }

    /// Loads `files` one after another. Every file produces exactly one notice;
    /// a failure only affects its own file. The camera is fitted once at the end.
    pub async fn load_files(&mut self, files: &[InputFile]) {
        if files.is_empty() {
            return;
        }
        for file in files {
            let result = self.load_file(&file.name, &file.bytes).await;
            self.report(&file.name, result);
        }
        self.fit_to_screen();
    }

    /// Like `load_files`, reading each path first; unreadable paths count as failed files
    pub async fn load_paths<P: AsRef<Path>>(&mut self, paths: &[P]) {
        if paths.is_empty() {
            return;
        }
        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let result = match InputFile::read(path) {
                Ok(file) => self.load_file(&file.name, &file.bytes).await,
                Err(e) => Err(e),
            };
            self.report(&name, result);
        }
        self.fit_to_screen();
    }

    fn report(&mut self, name: &str, result: Result<ModelStats, LoadError>) {
        match result {
            Ok(_) => self.notify(NoticeLevel::Success, format!("Successfully loaded: {}", name)),
            Err(e) => {
                error!("Error loading file {}: {}", name, e);
                self.notify(NoticeLevel::Error, format!("Error loading: {}", name));
            }
        }
    }

    /// Walks the configured example sources; the first one that both fetches
    /// and parses is displayed. When none does, the procedural robot is shown
    /// instead, so this always ends with a model on screen.
    pub async fn load_example(&mut self, fetcher: &dyn SourceFetcher) -> String {
        let sources = self.config.example_sources.clone();
        for source in &sources {
            info!("Attempting to load: {}", source.name);
            let bytes = match fetcher.fetch(source) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to load {}: {}", source.name, e);
                    continue;
                }
            };
            match self.dispatcher.load_as(source.format, &bytes).await {
                Ok(model) => {
                    self.display(model, &source.name);
                    let text = match source.location {
                        SourceLocation::Remote(_) => {
                            format!("Successfully loaded online model: {}", source.name)
                        }
                        SourceLocation::Local(_) => {
                            format!("Local model loaded successfully: {}", source.name)
                        }
                    };
                    self.notify(NoticeLevel::Success, text);
                    self.fit_to_screen();
                    return source.name.clone();
                }
                Err(e) => warn!("Failed to load {}: {}", source.name, e),
            }
        }

        let robot = create_example_robot();
        let name = robot.root.name.clone();
        self.display(robot, &name);
        self.notify(NoticeLevel::Info, "Created procedural robot model");
        self.fit_to_screen();
        name
    }

    pub fn fit_to_screen(&mut self) {
        if let Some(current) = &self.current {
            self.camera.fit_to_bounds(&current.model.root.world_bounds());
        }
    }

    pub fn reset_view(&mut self) {
        self.camera.reset();
    }

    fn for_each_material(&mut self, f: impl FnMut(&mut Material)) {
        if let Some(current) = &mut self.current {
            current.model.materials.iter_mut().for_each(f);
        }
    }

    pub fn toggle_wireframe(&mut self) {
        if self.current.is_none() {
            return;
        }
        let wireframe = !self.wireframe;
        self.wireframe = wireframe;
        self.for_each_material(|m| m.wireframe = wireframe);
    }

    /// Flat and smooth toggle flat shading; Phong and Lambert switch the
    /// lighting model of non-PBR materials
    pub fn set_shading(&mut self, mode: ShadingMode) {
        self.for_each_material(|m| match mode {
            ShadingMode::Flat => m.flat_shading = true,
            ShadingMode::Smooth => m.flat_shading = false,
            ShadingMode::Phong if m.kind != MaterialKind::Standard => m.kind = MaterialKind::Phong,
            ShadingMode::Lambert if m.kind != MaterialKind::Standard => {
                m.kind = MaterialKind::Lambert
            }
            _ => {}
        });
    }

    pub fn set_color(&mut self, color: [f32; 3]) {
        self.for_each_material(|m| m.color = color);
    }

    /// Only materials that carry a metalness factor change
    pub fn set_metalness(&mut self, value: f32) {
        self.for_each_material(|m| {
            if let Some(metalness) = m.metalness.as_mut() {
                *metalness = value;
            }
        });
    }

    pub fn set_roughness(&mut self, value: f32) {
        self.for_each_material(|m| {
            if let Some(roughness) = m.roughness.as_mut() {
                *roughness = value;
            }
        });
    }

    pub fn set_opacity(&mut self, value: f32) {
        self.for_each_material(|m| {
            m.opacity = value;
            m.transparent = value < 1.0;
        });
    }

    /// Encodes the current model; fails with `NoModel` when nothing is displayed
    pub fn export(&mut self, format: ExportFormat) -> Result<ExportArtifact, LoadError> {
        let current = self.current.as_ref().ok_or(LoadError::NoModel)?;
        match export_model(&current.model, format) {
            Ok(artifact) => {
                self.notify(NoticeLevel::Success, format!("Exported as {}", format));
                Ok(artifact)
            }
            Err(e) => {
                let text = format!("Export failed: {:#}", e);
                self.notify(NoticeLevel::Error, text);
                Err(LoadError::Export(e))
            }
        }
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            NoticeLevel::Error => error!("{}", text),
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", text),
        }
        self.notices.push(Notice { level, text });
    }

    /// Hands out pending notices, oldest first
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn current_model(&self) -> Option<&Model> {
        self.current.as_ref().map(|c| &c.model)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.name.as_str())
    }

    pub fn current_id(&self) -> Option<u64> {
        self.current.as_ref().map(|c| c.id)
    }

    pub fn stats(&self) -> ModelStats {
        self.current.as_ref().map(|c| c.stats).unwrap_or_default()
    }

    pub fn records(&self) -> &[LoadedModelRecord] {
        &self.records
    }

    pub fn camera(&self) -> &ViewCamera {
        &self.camera
    }

    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}
