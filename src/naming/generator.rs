//! Name generator - builds names from structured inputs
//!
//! Every generated name goes back through the [`Validator`]; a generated name
//! that fails validation means the pattern itself is misconfigured and is
//! reported as [`GenerateError::InvariantViolated`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::naming::pattern::{CompiledPattern, PolicyError, SlotKind};
use crate::naming::registry::PatternRegistry;
use crate::naming::validator::{ValidationContext, Validator, Violation, MAX_NAME_LENGTH};

/// Compact timestamp appended by `options.timestamp`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Generation switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Append a compact timestamp suffix
    #[serde(default)]
    pub timestamp: bool,

    /// Produce this many candidates that differ only in their suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<usize>,
}

/// Structured inputs for a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub resource_type: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(resource_type: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            environment: environment.into(),
            team: None,
            service: None,
            version: None,
            options: GenerationOptions::default(),
        }
    }

    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_timestamp(mut self) -> Self {
        self.options.timestamp = true;
        self
    }

    pub fn multiple(mut self, count: usize) -> Self {
        self.options.multiple = Some(count);
        self
    }

    fn input_for(&self, kind: SlotKind) -> Option<&str> {
        match kind {
            SlotKind::Team => self.team.as_deref(),
            SlotKind::Service => self.service.as_deref(),
            SlotKind::Version => self.version.as_deref(),
            SlotKind::Environment | SlotKind::ResourceType => None,
        }
    }
}

/// A slot value as rendered into the name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSlot {
    pub slot: SlotKind,
    pub value: String,
}

/// Generated names plus the metadata that produced them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated names; never empty
    pub names: Vec<String>,
    pub pattern_id: String,
    pub template: String,
    pub resource_type: String,
    pub environment: String,
    /// Resolved slot values in template order
    pub slots: Vec<ResolvedSlot>,
    pub generated_at: DateTime<Utc>,
}

impl GenerationResult {
    /// The first (or only) generated name
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }
}

/// Errors raised while generating a name
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Missing value for slot '{slot}' required by pattern '{pattern}'")]
    MissingSlot { pattern: String, slot: SlotKind },

    #[error("Value '{value}' for slot '{slot}' does not satisfy pattern '{pattern}'")]
    InvalidSlotValue {
        pattern: String,
        slot: SlotKind,
        value: String,
    },

    #[error("Pattern '{pattern}' does not allow suffixes (timestamp or multiple)")]
    SuffixNotAllowed { pattern: String },

    #[error("Generated name '{name}' is {length} characters; the maximum is {max}")]
    NameTooLong {
        name: String,
        length: usize,
        max: usize,
    },

    #[error("Number of names to generate must be at least 1")]
    InvalidMultiple,

    #[error("Pattern '{pattern}' generated invalid name '{name}' ({})", codes(.violations))]
    InvariantViolated {
        pattern: String,
        name: String,
        violations: Vec<Violation>,
    },
}

fn codes(violations: &[Violation]) -> String {
    violations
        .iter()
        .filter(|v| v.severity.is_blocking())
        .map(|v| v.code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generates names against one registry snapshot
pub struct Generator {
    validator: Validator,
}

impl Generator {
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self {
            validator: Validator::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<PatternRegistry> {
        self.validator.registry()
    }

    /// Generate names stamped with the current time
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerateError> {
        self.generate_at(request, Utc::now())
    }

    /// Generate names using `now` for timestamps
    pub fn generate_at(
        &self,
        request: &GenerationRequest,
        now: DateTime<Utc>,
    ) -> Result<GenerationResult, GenerateError> {
        let pattern = self
            .registry()
            .resolve(&request.resource_type, &request.environment)?;

        let slots = resolve_slots(pattern, request)?;
        let values: BTreeMap<SlotKind, String> = slots
            .iter()
            .map(|s| (s.slot, s.value.clone()))
            .collect();

        let count = request.options.multiple.unwrap_or(1);
        if count == 0 {
            return Err(GenerateError::InvalidMultiple);
        }

        let stamp = request
            .options
            .timestamp
            .then(|| now.format(TIMESTAMP_FORMAT).to_string());
        let width = count.to_string().len();

        let mut names = Vec::with_capacity(count);
        for index in 1..=count {
            let suffix = match (&stamp, count > 1) {
                (None, false) => None,
                (Some(stamp), false) => Some(stamp.clone()),
                (None, true) => Some(format!("{:0width$}", index, width = width)),
                (Some(stamp), true) => Some(format!("{}-{:0width$}", stamp, index, width = width)),
            };

            if suffix.is_some() && !pattern.allows_suffix() {
                return Err(GenerateError::SuffixNotAllowed {
                    pattern: pattern.id().to_string(),
                });
            }

            let name = pattern.render(&values, suffix.as_deref());
            let length = name.chars().count();
            if length > MAX_NAME_LENGTH {
                return Err(GenerateError::NameTooLong {
                    name,
                    length,
                    max: MAX_NAME_LENGTH,
                });
            }

            let check = self.validator.check(
                &name,
                &request.resource_type,
                &request.environment,
                &ValidationContext::default(),
            );
            if !check.valid {
                tracing::error!(
                    pattern = pattern.id(),
                    name = %name,
                    "generated name failed validation; pattern is misconfigured"
                );
                return Err(GenerateError::InvariantViolated {
                    pattern: pattern.id().to_string(),
                    name,
                    violations: check.violations,
                });
            }

            names.push(name);
        }

        tracing::debug!(pattern = pattern.id(), count = names.len(), "names generated");

        Ok(GenerationResult {
            names,
            pattern_id: pattern.id().to_string(),
            template: pattern.template().to_string(),
            resource_type: request.resource_type.clone(),
            environment: request.environment.clone(),
            slots,
            generated_at: now,
        })
    }
}

fn resolve_slots(
    pattern: &CompiledPattern,
    request: &GenerationRequest,
) -> Result<Vec<ResolvedSlot>, GenerateError> {
    pattern
        .slots()
        .map(|slot| {
            let value = request
                .input_for(slot)
                .map(|raw| slot.normalize(raw))
                .filter(|v| !v.is_empty())
                .or_else(|| pattern.default_for(slot, &request.environment))
                .ok_or_else(|| GenerateError::MissingSlot {
                    pattern: pattern.id().to_string(),
                    slot,
                })?;

            if !pattern.slot_matches(slot, &value) {
                return Err(GenerateError::InvalidSlotValue {
                    pattern: pattern.id().to_string(),
                    slot,
                    value,
                });
            }

            Ok(ResolvedSlot { slot, value })
        })
        .collect()
}
