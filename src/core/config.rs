//! Configuration layering
//!
//! Precedence (later wins): built-in defaults, user config
//! (`<config dir>/ngt/config.yaml`), project config (`.ngt/config.yaml`),
//! then environment overrides (`NGT_AUTHOR`).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_yml::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::naming::validator::DEFAULT_MAX_SUGGESTIONS;

/// Environment variable overriding the configured author
pub const AUTHOR_ENV: &str = "NGT_AUTHOR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Suggestions attached to an invalid result
    pub max_suggestions: usize,
    /// Treat warnings as failures in `ngt validate`
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".ngt/audit.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameIndexConfig {
    pub path: PathBuf,
}

impl Default for NameIndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".ngt/names.db"),
        }
    }
}

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub patterns_dir: PathBuf,
    pub include_builtin_patterns: bool,
    pub validation: ValidationConfig,
    pub audit: AuditConfig,
    pub naming_index: NameIndexConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            author: None,
            patterns_dir: PathBuf::from("patterns"),
            include_builtin_patterns: false,
            validation: ValidationConfig::default(),
            audit: AuditConfig::default(),
            naming_index: NameIndexConfig::default(),
        }
    }
}

impl Config {
    /// Load the layered configuration for a project root (or none)
    pub fn load(project_root: Option<&Path>) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        if let Some(path) = user_config_path() {
            layers.push(path);
        }
        if let Some(root) = project_root {
            layers.push(root.join(".ngt").join("config.yaml"));
        }

        let mut config = Self::from_files(&layers)?;
        if let Ok(author) = std::env::var(AUTHOR_ENV) {
            if !author.trim().is_empty() {
                config.author = Some(author);
            }
        }
        Ok(config)
    }

    /// Merge existing files in order, later files winning key by key
    pub fn from_files(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = Value::Mapping(Default::default());

        for path in paths.iter().filter(|p| p.is_file()) {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let layer: Value = serde_yml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            tracing::debug!(path = %path.display(), "config layer loaded");
            merge(&mut merged, layer);
        }

        serde_yml::from_value(merged).map_err(|e| ConfigError::Parse {
            path: paths.last().cloned().unwrap_or_default(),
            message: e.to_string(),
        })
    }

    /// Author recorded on requests and audit events
    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Project config written by `ngt init`
    pub fn project_template() -> String {
        r#"# ngt project configuration
# author: jane.doe
patterns_dir: patterns
include_builtin_patterns: false
validation:
  max_suggestions: 3
  strict: false
audit:
  enabled: true
  path: .ngt/audit.jsonl
naming_index:
  path: .ngt/names.db
"#
        .to_string()
    }
}

fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ngt").map(|dirs| dirs.config_dir().join("config.yaml"))
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}
