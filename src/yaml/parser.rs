//! Typed loading of pattern, team and request documents

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::yaml::diagnostics::{YamlError, YamlSyntaxError};

/// Deserialize a YAML document; syntax and shape errors carry the source location
pub fn parse_yaml<T: DeserializeOwned>(content: &str, filename: &str) -> Result<T, YamlError> {
    match serde_yml::from_str(content) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::debug!(file = filename, error = %e, "YAML document rejected");
            Err(YamlSyntaxError::from_serde_error(&e, content, filename).into())
        }
    }
}

/// Read and deserialize a YAML document from disk
pub fn parse_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, YamlError> {
    let content = std::fs::read_to_string(path)?;
    parse_yaml(&content, &path.display().to_string())
}
