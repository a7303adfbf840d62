use std::path::{Path, PathBuf};

use thiserror::Error;

/// Unified error type for pdf-resize-core
///
/// This enum covers every error the library can report:
/// - Document errors (opening the source, creating the destination)
/// - Request validation (target page size)
/// - Configuration operations (loading, validation)
/// - Background task failures
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Document Errors
    // ==========================================================================
    /// The input location could not be opened as a PDF document
    #[error("could not open input PDF {}: {reason}", path.display())]
    SourceUnopenable { path: PathBuf, reason: String },

    /// The output location could not be created or written
    #[error("could not create output PDF {}: {reason}", path.display())]
    DestinationUncreatable { path: PathBuf, reason: String },

    // ==========================================================================
    // Request Errors
    // ==========================================================================
    /// Target page size has a non-positive or non-finite component
    #[error("invalid target size {width}x{height}: both dimensions must be positive")]
    InvalidTargetSize { width: f32, height: f32 },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // Runtime Errors
    // ==========================================================================
    /// The background resize task panicked or was aborted
    #[error("resize task failed: {0}")]
    Task(String),
}

impl Error {
    /// Location involved in a document error, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceUnopenable { path, .. } | Self::DestinationUncreatable { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
