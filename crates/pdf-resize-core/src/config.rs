use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// PDF header version written when nothing else is configured
pub const DEFAULT_PDF_VERSION: &str = "1.5";

// Serde default functions
const fn default_true() -> bool {
    true
}

fn default_pdf_version() -> String {
    DEFAULT_PDF_VERSION.to_string()
}

/// Options that shape the output document of a resize run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOptions {
    /// Compress output streams before saving
    pub compress: bool,
    /// PDF version written to the output header (e.g. "1.5")
    pub pdf_version: String,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            compress: true,
            pdf_version: default_pdf_version(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeConfig {
    /// Compress streams in the output document
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Output PDF version
    #[serde(default = "default_pdf_version")]
    pub pdf_version: String,

    /// Show a progress bar in the CLI
    #[serde(default = "default_true")]
    pub progress_bar: bool,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            compress: true,
            pdf_version: default_pdf_version(),
            progress_bar: true,
        }
    }
}

impl ResizeConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Load from default locations (~/.config/pdf-resize/config.toml, ./config.toml)
    pub fn load() -> Self {
        let candidates = crate::util::config_dir()
            .map(|dir| dir.join("pdf-resize").join("config.toml"))
            .into_iter()
            .chain(std::iter::once(PathBuf::from("config.toml")));

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", path.display(), e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Check field values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if !is_supported_pdf_version(&self.pdf_version) {
            return Err(Error::ConfigInvalid {
                field: "pdf_version".to_string(),
                reason: format!("unsupported version '{}'", self.pdf_version),
            });
        }
        Ok(())
    }

    /// The part of the configuration consumed by the resize pipeline
    pub fn resize_options(&self) -> ResizeOptions {
        ResizeOptions {
            compress: self.compress,
            pdf_version: self.pdf_version.clone(),
        }
    }
}

/// Accepts `1.0` through `1.7` and `2.0`.
fn is_supported_pdf_version(version: &str) -> bool {
    match version.split_once('.') {
        Some(("1", minor)) => matches!(minor, "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7"),
        Some(("2", "0")) => true,
        _ => false,
    }
}
