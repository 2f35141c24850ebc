//! Model loader

use crate::error::{Error, Result};
use crate::config::NginxConfig;
use std::path::Path;

/// Loads and stores models in their serialized forms
pub struct ConfigLoader;

impl ConfigLoader {
    /// Whether a path names a serialized model rather than nginx text
    pub fn is_model_file<P: AsRef<Path>>(path: P) -> bool {
        matches!(
            path.as_ref().extension().and_then(|e| e.to_str()),
            Some("json" | "toml")
        )
    }

    /// Load a model from a `.json` or `.toml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<NginxConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read model file {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        tracing::debug!("Loading model from {} ({})", path.display(), ext);

        match ext {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            _ => Err(Error::Config(format!("Unknown model format: {}", ext))),
        }
    }

    /// Parse JSON model
    pub fn from_json(content: &str) -> Result<NginxConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML model
    pub fn from_toml(content: &str) -> Result<NginxConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Serialize a model to pretty JSON
    pub fn to_json(config: &NginxConfig) -> Result<String> {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize a model to TOML
    pub fn to_toml(config: &NginxConfig) -> Result<String> {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(e.to_string()))
    }
}
