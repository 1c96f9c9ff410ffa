//! Schema registry - embedded JSON schemas and builtin pattern documents

use rust_embed::Embed;
use serde_json::Value;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

#[derive(Embed)]
#[folder = "patterns/"]
struct EmbeddedPatterns;

const PATTERN_SCHEMA: &str = "pattern.schema.json";

/// Registry of JSON schemas for pattern document validation
pub struct SchemaRegistry {
    pattern: Option<jsonschema::Validator>,
}

impl SchemaRegistry {
    /// Create a new schema registry with embedded schemas
    pub fn new() -> Self {
        let pattern = EmbeddedSchemas::get(PATTERN_SCHEMA)
            .and_then(|file| serde_json::from_slice::<Value>(&file.data).ok())
            .and_then(|schema| match jsonschema::validator_for(&schema) {
                Ok(validator) => Some(validator),
                Err(e) => {
                    tracing::error!(error = %e, "embedded pattern schema failed to compile");
                    None
                }
            });

        Self { pattern }
    }

    /// Check if the pattern schema is available
    pub fn has_pattern_schema(&self) -> bool {
        self.pattern.is_some()
    }

    /// Raw text of the pattern schema
    pub fn pattern_schema_source() -> Option<String> {
        EmbeddedSchemas::get(PATTERN_SCHEMA)
            .and_then(|file| std::str::from_utf8(&file.data).ok().map(str::to_string))
    }

    /// Schema violations for a pattern document, formatted as `path: message`
    pub fn pattern_errors(&self, document: &Value) -> Vec<String> {
        match &self.pattern {
            Some(validator) => validator
                .iter_errors(document)
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Builtin pattern documents as (filename, content), sorted by filename
    pub fn builtin_pattern_documents() -> Vec<(String, String)> {
        let mut docs: Vec<(String, String)> = EmbeddedPatterns::iter()
            .filter_map(|name| {
                let file = EmbeddedPatterns::get(&name)?;
                let content = std::str::from_utf8(&file.data).ok()?.to_string();
                Some((name.to_string(), content))
            })
            .collect();
        docs.sort();
        docs
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
