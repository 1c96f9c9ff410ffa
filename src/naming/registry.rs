//! Pattern registry - immutable snapshots of compiled naming patterns
//!
//! A [`PatternRegistry`] is built once from a set of pattern documents and never
//! mutated afterwards. [`RegistryHandle`] owns the active snapshot pointer;
//! reloading builds a fresh snapshot and swaps the pointer, so callers that
//! already hold an `Arc<PatternRegistry>` keep reading the snapshot they started with.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::naming::pattern::{CompiledPattern, NamingPattern, PolicyError, ANY_ENVIRONMENT};
use crate::schema::registry::SchemaRegistry;
use crate::yaml::parse_yaml;

type PatternKey = (String, String);

/// An immutable set of compiled patterns keyed by (resource type, environment)
#[derive(Debug)]
pub struct PatternRegistry {
    patterns: HashMap<PatternKey, Arc<CompiledPattern>>,
    loaded_at: DateTime<Utc>,
}

impl PatternRegistry {
    /// Compile and register every pattern into a fresh snapshot
    ///
    /// Fails on the first malformed pattern or on two patterns sharing a key;
    /// no partial snapshot is ever returned.
    pub fn load(patterns: impl IntoIterator<Item = NamingPattern>) -> Result<Self, PolicyError> {
        let mut map: HashMap<PatternKey, Arc<CompiledPattern>> = HashMap::new();

        for def in patterns {
            let key = def.key();
            if let Some(existing) = map.get(&key) {
                return Err(PolicyError::DuplicatePattern {
                    resource_type: key.0,
                    environment: key.1,
                    first: existing.id().to_string(),
                    second: def.id,
                });
            }
            let compiled = CompiledPattern::compile(def)?;
            map.insert(key, Arc::new(compiled));
        }

        tracing::debug!(patterns = map.len(), "naming pattern snapshot built");

        Ok(Self {
            patterns: map,
            loaded_at: Utc::now(),
        })
    }

    /// A snapshot with no patterns; every lookup yields `PatternNotFound`
    pub fn empty() -> Self {
        Self {
            patterns: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    /// Load the builtin pattern documents shipped with the toolkit
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::load(builtin_patterns()?)
    }

    /// Resolve the pattern for a resource type and environment
    ///
    /// Lookups are case-insensitive. An exact environment match wins over a
    /// `*` pattern for the same type.
    pub fn resolve(
        &self,
        resource_type: &str,
        environment: &str,
    ) -> Result<&Arc<CompiledPattern>, PolicyError> {
        let resource_type_key = resource_type.trim().to_lowercase();
        self.patterns
            .get(&(resource_type_key.clone(), environment.trim().to_lowercase()))
            .or_else(|| {
                self.patterns
                    .get(&(resource_type_key, ANY_ENVIRONMENT.to_string()))
            })
            .ok_or_else(|| PolicyError::PatternNotFound {
                resource_type: resource_type.to_string(),
                environment: environment.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// All patterns, sorted by (resource type, environment)
    pub fn patterns(&self) -> Vec<&Arc<CompiledPattern>> {
        let mut all: Vec<_> = self.patterns.iter().collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all.into_iter().map(|(_, p)| p).collect()
    }
}

/// Owner of the active registry snapshot
///
/// Readers take a cheap `Arc` clone of the current snapshot; [`reload`](Self::reload)
/// replaces the pointer in a single write.
#[derive(Debug)]
pub struct RegistryHandle {
    active: RwLock<Arc<PatternRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: PatternRegistry) -> Self {
        Self {
            active: RwLock::new(Arc::new(registry)),
        }
    }

    /// The snapshot active at the time of the call
    pub fn snapshot(&self) -> Arc<PatternRegistry> {
        self.active.read().clone()
    }

    /// Build a new snapshot and make it active
    ///
    /// On failure the previously active snapshot stays in place.
    pub fn reload(
        &self,
        patterns: impl IntoIterator<Item = NamingPattern>,
    ) -> Result<Arc<PatternRegistry>, PolicyError> {
        let fresh = Arc::new(PatternRegistry::load(patterns)?);
        *self.active.write() = Arc::clone(&fresh);
        tracing::info!(patterns = fresh.len(), "naming pattern registry reloaded");
        Ok(fresh)
    }
}

/// Parse the builtin pattern documents
pub fn builtin_patterns() -> Result<Vec<NamingPattern>, PolicyError> {
    let schemas = SchemaRegistry::default();
    SchemaRegistry::builtin_pattern_documents()
        .into_iter()
        .map(|(filename, content)| {
            parse_pattern_document(&schemas, &content, Path::new(&filename))
        })
        .collect()
}

/// Load every `*.yaml`/`*.yml` pattern document under a directory, sorted by path
pub fn load_pattern_dir(dir: &Path) -> Result<Vec<NamingPattern>, PolicyError> {
    let schemas = SchemaRegistry::default();
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        let is_pattern = entry.file_type().is_file()
            && matches!(
                entry.path().extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            );
        if is_pattern {
            files.push(entry.into_path());
        }
    }
    files.sort();

    files
        .iter()
        .map(|path| load_pattern_file(&schemas, path))
        .collect()
}

/// Load a single pattern document
pub fn load_pattern_file(schemas: &SchemaRegistry, path: &Path) -> Result<NamingPattern, PolicyError> {
    let content = std::fs::read_to_string(path)?;
    parse_pattern_document(schemas, &content, path)
}

/// Check a pattern document against the pattern schema, then deserialize it
pub fn parse_pattern_document(
    schemas: &SchemaRegistry,
    content: &str,
    path: &Path,
) -> Result<NamingPattern, PolicyError> {
    let filename = path.display().to_string();
    let value: serde_json::Value = parse_yaml(content, &filename)?;

    let errors = schemas.pattern_errors(&value);
    if !errors.is_empty() {
        return Err(PolicyError::Schema {
            path: path.to_path_buf(),
            errors: errors.join("\n"),
        });
    }

    Ok(parse_yaml(content, &filename)?)
}
