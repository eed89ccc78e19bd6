// cli.rs - Command-line interface configuration
use clap::Parser;
use std::path::PathBuf;

use crate::export::ExportFormat;
use crate::session::ShadingMode;

#[derive(Parser, Debug, Clone)]
#[command(name = "cad-viewer")]
#[command(about = "Load, normalize and export CAD models", long_about = None)]
pub struct Cli {
    /// Model files to load in order; the last one that loads stays current
    pub files: Vec<PathBuf>,

    /// Load the example model chain (falls back to a procedural robot)
    #[arg(long)]
    pub example: bool,

    /// Export the current model after loading
    #[arg(long, value_enum)]
    pub export: Option<ExportFormat>,

    /// Directory the export is written to
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// JSON config file; falls back to $CAD_VIEWER_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip remote example sources
    #[arg(long)]
    pub offline: bool,

    /// Recolor every material, as hex like "#ff8800"
    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub opacity: Option<f32>,

    #[arg(long, value_enum)]
    pub shading: Option<ShadingMode>,

    #[arg(long)]
    pub wireframe: bool,
}

impl Cli {
    /// With no files given, the example model is shown
    pub fn wants_example(&self) -> bool {
        self.example || self.files.is_empty()
    }
}
