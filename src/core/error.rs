//! Error types for build runs

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring or running a build
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or invalid configuration; no pipeline is started
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{optimizer} failed on {path}: {message}")]
    Optimize {
        optimizer: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Failed to rejoin {path}: {message}")]
    Rejoin { path: PathBuf, message: String },

    #[error("Bundling failed: {0}")]
    Bundle(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Service worker generation failed: {0}")]
    ServiceWorker(String),

    /// The downstream end of a stream went away before the item was delivered
    #[error("Stream closed before stage '{0}' could deliver its output")]
    StreamClosed(&'static str),

    #[error("Pipeline task failed: {0}")]
    Task(String),
}

impl BuildError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_stream_closed(&self) -> bool {
        matches!(self, BuildError::StreamClosed(_))
    }
}
