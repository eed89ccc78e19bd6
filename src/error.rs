use std::path::PathBuf;

use thiserror::Error;

use crate::dispatch::ModelFormat;

/// Every way a single load request can fail. Each one is terminal for that item only.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse {format} data: {reason:#}")]
    Parse {
        format: ModelFormat,
        reason: anyhow::Error,
    },

    #[error("Request for {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No model to export")]
    NoModel,

    #[error("Export failed: {0:#}")]
    Export(anyhow::Error),
}

impl LoadError {
    pub fn parse(format: ModelFormat, reason: anyhow::Error) -> Self {
        LoadError::Parse { format, reason }
    }

    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        LoadError::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}
