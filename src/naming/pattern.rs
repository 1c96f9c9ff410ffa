//! Naming patterns - templates with typed slots
//!
//! A pattern document declares a template such as
//! `{environment}-{team}-{service}-{resourceType}-{version}` together with
//! per-slot constraints. Documents are compiled once into a [`CompiledPattern`]
//! whose matcher decomposes candidate names back into slot values.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::yaml::YamlError;

/// Wildcard environment: a pattern that applies to every environment of a resource type
pub const ANY_ENVIRONMENT: &str = "*";

/// A named placeholder within a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    Environment,
    Team,
    Service,
    ResourceType,
    Version,
}

impl SlotKind {
    pub fn all() -> &'static [SlotKind] {
        &[
            SlotKind::Environment,
            SlotKind::Team,
            SlotKind::Service,
            SlotKind::ResourceType,
            SlotKind::Version,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Environment => "environment",
            SlotKind::Team => "team",
            SlotKind::Service => "service",
            SlotKind::ResourceType => "resourceType",
            SlotKind::Version => "version",
        }
    }

    /// Constraint applied when the pattern document does not override it
    pub fn default_constraint(&self) -> &'static str {
        match self {
            SlotKind::Environment | SlotKind::Team | SlotKind::ResourceType => "[a-z0-9]+",
            SlotKind::Service => "[a-z0-9]+(?:-[a-z0-9]+)*",
            SlotKind::Version => "[0-9]+(?:\\.[0-9]+)*",
        }
    }

    /// Built-in default value for optional slots
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            SlotKind::Version => Some("v1"),
            _ => None,
        }
    }

    /// Canonical rendering of a raw input value for this slot
    ///
    /// Values are trimmed and lowercased, spaces and underscores become hyphens,
    /// and a leading `v` is dropped from versions (`v1.0.0` renders as `1.0.0`).
    pub fn normalize(&self, raw: &str) -> String {
        let value: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '_' { '-' } else { c })
            .collect();

        match self {
            SlotKind::Version => value.strip_prefix('v').unwrap_or(&value).to_string(),
            _ => value,
        }
    }
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SlotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environment" => Ok(SlotKind::Environment),
            "team" => Ok(SlotKind::Team),
            "service" => Ok(SlotKind::Service),
            "resourceType" | "resource_type" => Ok(SlotKind::ResourceType),
            "version" => Ok(SlotKind::Version),
            _ => Err(format!("Unknown slot: {}", s)),
        }
    }
}

/// Per-slot policy from a pattern document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRule {
    /// Regex constraint (unanchored; anchoring is applied by the compiler)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Value used when the generator is not given one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A naming pattern document, as loaded from YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPattern {
    /// Stable identifier reported in generation metadata
    pub id: String,

    /// Resource type this pattern governs (e.g. "k8s-deployment")
    pub resource_type: String,

    /// Environment this pattern governs, or `*` for all environments
    pub environment: String,

    /// Template string with `{slot}` placeholders
    pub template: String,

    /// Token rendered into `{environment}` (defaults to the environment name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_token: Option<String>,

    /// Token rendered into `{resourceType}` (defaults to the resource type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_token: Option<String>,

    /// Scope within which generated names must be unique
    #[serde(default = "default_uniqueness_scope")]
    pub uniqueness_scope: String,

    /// Whether a trailing `-suffix` slot is accepted (timestamps, batch indexes)
    #[serde(default = "default_allow_suffix")]
    pub allow_suffix: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Per-slot constraints and defaults
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<SlotKind, SlotRule>,
}

fn default_uniqueness_scope() -> String {
    "environment".to_string()
}

fn default_allow_suffix() -> bool {
    true
}

impl NamingPattern {
    /// Create a pattern with default slot rules
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        environment: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            environment: environment.into(),
            template: template.into(),
            environment_token: None,
            resource_token: None,
            uniqueness_scope: default_uniqueness_scope(),
            allow_suffix: true,
            description: None,
            slots: BTreeMap::new(),
        }
    }

    pub fn with_resource_token(mut self, token: impl Into<String>) -> Self {
        self.resource_token = Some(token.into());
        self
    }

    pub fn with_environment_token(mut self, token: impl Into<String>) -> Self {
        self.environment_token = Some(token.into());
        self
    }

    pub fn with_slot(mut self, kind: SlotKind, rule: SlotRule) -> Self {
        self.slots.insert(kind, rule);
        self
    }

    /// Registry key for this pattern, case-folded like lookups
    pub fn key(&self) -> (String, String) {
        (
            self.resource_type.trim().to_lowercase(),
            self.environment.trim().to_lowercase(),
        )
    }
}

/// Pattern registry misconfiguration - fatal for the load that produced it
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Duplicate naming pattern for ({resource_type}, {environment}): {first} and {second}")]
    DuplicatePattern {
        resource_type: String,
        environment: String,
        first: String,
        second: String,
    },

    #[error("No naming pattern for resource type '{resource_type}' in environment '{environment}'")]
    PatternNotFound {
        resource_type: String,
        environment: String,
    },

    #[error("Malformed template in pattern '{id}': {reason}")]
    MalformedTemplate { id: String, reason: String },

    #[error("Invalid constraint for slot '{slot}' in pattern '{id}': {source}")]
    InvalidConstraint {
        id: String,
        slot: SlotKind,
        #[source]
        source: regex::Error,
    },

    #[error("Pattern document {path} does not match the pattern schema:\n{errors}")]
    Schema { path: PathBuf, errors: String },

    #[error("Failed to read pattern document: {0}")]
    Document(#[from] YamlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Slot(SlotKind),
}

/// Parse a template string into literal and slot segments
pub fn parse_template(template: &str) -> Result<Vec<Segment>, String> {
    if template.trim().is_empty() {
        return Err("template is empty".to_string());
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err("nested '{' inside slot".to_string()),
                        _ => name.push(c),
                    }
                }
                if !closed {
                    return Err(format!("unclosed slot '{{{}'", name));
                }
                let kind: SlotKind = name.parse()?;

                if literal.is_empty() {
                    if let Some(Segment::Slot(prev)) = segments.last() {
                        return Err(format!(
                            "slots {{{}}} and {{{}}} need a literal separator",
                            prev, kind
                        ));
                    }
                } else {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                if segments.contains(&Segment::Slot(kind)) {
                    return Err(format!("slot {{{}}} appears more than once", kind));
                }
                segments.push(Segment::Slot(kind));
            }
            '}' => return Err("unmatched '}'".to_string()),
            c if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.' => {
                literal.push(c)
            }
            c => return Err(format!("literal contains invalid character '{}'", c)),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Slot values recovered from a name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    pub slots: BTreeMap<SlotKind, String>,
    pub suffix: Option<String>,
}

/// A pattern compiled for matching and rendering
#[derive(Debug)]
pub struct CompiledPattern {
    def: NamingPattern,
    segments: Vec<Segment>,
    matcher: Regex,
    constraints: BTreeMap<SlotKind, Regex>,
}

impl CompiledPattern {
    /// Compile a pattern document
    pub fn compile(def: NamingPattern) -> Result<Self, PolicyError> {
        let segments = parse_template(&def.template).map_err(|reason| {
            PolicyError::MalformedTemplate {
                id: def.id.clone(),
                reason,
            }
        })?;

        let mut constraints = BTreeMap::new();
        let mut expr = String::from("^");

        for segment in &segments {
            match segment {
                Segment::Literal(text) => expr.push_str(&regex::escape(text)),
                Segment::Slot(kind) => {
                    let rule = constraint_source(&def, *kind);
                    let anchored = Regex::new(&format!("^(?:{})$", rule)).map_err(|source| {
                        PolicyError::InvalidConstraint {
                            id: def.id.clone(),
                            slot: *kind,
                            source,
                        }
                    })?;
                    constraints.insert(*kind, anchored);
                    expr.push_str(&format!("(?P<{}>(?:{}))", kind.as_str(), rule));
                }
            }
        }

        if def.allow_suffix {
            expr.push_str("(?:-(?P<suffix>[a-z0-9]+(?:-[a-z0-9]+)*))?");
        }
        expr.push('$');

        let matcher = Regex::new(&expr).map_err(|e| PolicyError::MalformedTemplate {
            id: def.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            def,
            segments,
            matcher,
            constraints,
        })
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn definition(&self) -> &NamingPattern {
        &self.def
    }

    pub fn template(&self) -> &str {
        &self.def.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Slots that appear in the template, in template order
    pub fn slots(&self) -> impl Iterator<Item = SlotKind> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(kind) => Some(*kind),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_slot(&self, kind: SlotKind) -> bool {
        self.constraints.contains_key(&kind)
    }

    pub fn allows_suffix(&self) -> bool {
        self.def.allow_suffix
    }

    /// Environment token for a requested environment
    pub fn environment_token(&self, environment: &str) -> String {
        match &self.def.environment_token {
            Some(token) => token.clone(),
            None if self.def.environment == ANY_ENVIRONMENT => {
                SlotKind::Environment.normalize(environment)
            }
            None => SlotKind::Environment.normalize(&self.def.environment),
        }
    }

    /// Token rendered into the `{resourceType}` slot
    pub fn resource_token(&self) -> String {
        match &self.def.resource_token {
            Some(token) => token.clone(),
            None => SlotKind::ResourceType.normalize(&self.def.resource_type),
        }
    }

    /// Default value for a slot, if the policy defines one
    pub fn default_for(&self, kind: SlotKind, environment: &str) -> Option<String> {
        match kind {
            SlotKind::Environment => Some(self.environment_token(environment)),
            SlotKind::ResourceType => Some(self.resource_token()),
            _ => self
                .def
                .slots
                .get(&kind)
                .and_then(|rule| rule.default.clone())
                .or_else(|| kind.default_value().map(str::to_string))
                .map(|value| kind.normalize(&value)),
        }
    }

    /// Name prefix every name must start with, when the template leads with `{environment}`
    pub fn environment_prefix(&self, environment: &str) -> Option<String> {
        match self.segments.first() {
            Some(Segment::Slot(SlotKind::Environment)) => {
                let mut prefix = self.environment_token(environment);
                if let Some(Segment::Literal(sep)) = self.segments.get(1) {
                    prefix.push_str(sep);
                }
                Some(prefix)
            }
            _ => None,
        }
    }

    /// Key of the uniqueness scope a name falls into
    ///
    /// `global` patterns share one scope, `team` patterns are scoped per team,
    /// and anything else is scoped per environment.
    pub fn scope_key(&self, environment: &str, slots: &BTreeMap<SlotKind, String>) -> String {
        match self.def.uniqueness_scope.as_str() {
            "global" => "global".to_string(),
            "team" => format!(
                "team:{}",
                slots.get(&SlotKind::Team).map(String::as_str).unwrap_or("-")
            ),
            _ => format!("env:{}", self.environment_token(environment)),
        }
    }

    /// Check a single slot value against its constraint
    pub fn slot_matches(&self, kind: SlotKind, value: &str) -> bool {
        self.constraints
            .get(&kind)
            .map(|re| re.is_match(value))
            .unwrap_or(false)
    }

    /// Recover slot values from a name, if it fits the template
    pub fn decompose(&self, name: &str) -> Option<Decomposition> {
        let captures = self.matcher.captures(name)?;
        let slots = self
            .slots()
            .filter_map(|kind| {
                captures
                    .name(kind.as_str())
                    .map(|m| (kind, m.as_str().to_string()))
            })
            .collect();
        let suffix = captures.name("suffix").map(|m| m.as_str().to_string());
        Some(Decomposition { slots, suffix })
    }

    /// Render a name from resolved slot values plus an optional suffix
    pub fn render(&self, values: &BTreeMap<SlotKind, String>, suffix: Option<&str>) -> String {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => name.push_str(text),
                Segment::Slot(kind) => {
                    if let Some(value) = values.get(kind) {
                        name.push_str(value);
                    }
                }
            }
        }
        if let Some(suffix) = suffix {
            name.push('-');
            name.push_str(suffix);
        }
        name
    }
}

fn constraint_source(def: &NamingPattern, kind: SlotKind) -> String {
    if let Some(pattern) = def.slots.get(&kind).and_then(|r| r.pattern.clone()) {
        return pattern;
    }
    match kind {
        SlotKind::ResourceType => {
            let token = def
                .resource_token
                .clone()
                .unwrap_or_else(|| kind.normalize(&def.resource_type));
            regex::escape(&token)
        }
        SlotKind::Environment if def.environment != ANY_ENVIRONMENT => {
            let token = def
                .environment_token
                .clone()
                .unwrap_or_else(|| kind.normalize(&def.environment));
            regex::escape(&token)
        }
        _ => kind.default_constraint().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> CompiledPattern {
        CompiledPattern::compile(
            NamingPattern::new(
                "k8s-deployment-prod",
                "k8s-deployment",
                "prod",
                "{environment}-{team}-{service}-{resourceType}-{version}",
            )
            .with_resource_token("deploy"),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_template_segments() {
        let segments = parse_template("{environment}-{team}-svc").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Slot(SlotKind::Environment),
                Segment::Literal("-".to_string()),
                Segment::Slot(SlotKind::Team),
                Segment::Literal("-svc".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_template_rejects_malformed() {
        assert!(parse_template("").is_err());
        assert!(parse_template("{environment").is_err());
        assert!(parse_template("env}").is_err());
        assert!(parse_template("{owner}-x").is_err());
        assert!(parse_template("{team}{service}").is_err());
        assert!(parse_template("{team}-{team}").is_err());
        assert!(parse_template("{team}_x").is_err());
    }

    #[test]
    fn test_slot_normalize() {
        assert_eq!(SlotKind::Version.normalize("v1.0.0"), "1.0.0");
        assert_eq!(SlotKind::Version.normalize("2"), "2");
        assert_eq!(SlotKind::Team.normalize(" Platform_Core "), "platform-core");
    }

    #[test]
    fn test_decompose_valid_name() {
        let pattern = deployment();
        let parts = pattern
            .decompose("prod-platform-payment-deploy-1.0.0")
            .unwrap();
        assert_eq!(parts.slots[&SlotKind::Environment], "prod");
        assert_eq!(parts.slots[&SlotKind::Team], "platform");
        assert_eq!(parts.slots[&SlotKind::Service], "payment");
        assert_eq!(parts.slots[&SlotKind::ResourceType], "deploy");
        assert_eq!(parts.slots[&SlotKind::Version], "1.0.0");
        assert_eq!(parts.suffix, None);
    }

    #[test]
    fn test_decompose_with_suffix_and_hyphenated_service() {
        let pattern = deployment();
        let parts = pattern
            .decompose("prod-platform-card-auth-deploy-2-03")
            .unwrap();
        assert_eq!(parts.slots[&SlotKind::Service], "card-auth");
        assert_eq!(parts.slots[&SlotKind::Version], "2");
        assert_eq!(parts.suffix.as_deref(), Some("03"));
    }

    #[test]
    fn test_decompose_rejects_wrong_shape() {
        let pattern = deployment();
        assert!(pattern.decompose("prod-payment-deploy-1.0.0").is_none());
        assert!(pattern.decompose("prod-platform-payment-svc-1").is_none());
    }

    #[test]
    fn test_render_round_trips() {
        let pattern = deployment();
        let mut values = BTreeMap::new();
        values.insert(SlotKind::Environment, "prod".to_string());
        values.insert(SlotKind::Team, "platform".to_string());
        values.insert(SlotKind::Service, "payment".to_string());
        values.insert(SlotKind::ResourceType, "deploy".to_string());
        values.insert(SlotKind::Version, "1.0.0".to_string());

        let name = pattern.render(&values, None);
        assert_eq!(name, "prod-platform-payment-deploy-1.0.0");
        assert_eq!(pattern.decompose(&name).unwrap().slots, values);
    }

    #[test]
    fn test_environment_prefix_and_tokens() {
        let pattern = deployment();
        assert_eq!(pattern.environment_prefix("prod").as_deref(), Some("prod-"));
        assert_eq!(pattern.resource_token(), "deploy");
        assert_eq!(
            pattern.default_for(SlotKind::Version, "prod").as_deref(),
            Some("1")
        );

        let wildcard = CompiledPattern::compile(NamingPattern::new(
            "bucket-any",
            "bucket",
            ANY_ENVIRONMENT,
            "{environment}-{team}-{resourceType}",
        ))
        .unwrap();
        assert_eq!(wildcard.environment_token("Staging"), "staging");
    }

    #[test]
    fn test_invalid_slot_constraint_is_policy_error() {
        let def = NamingPattern::new("bad", "queue", "dev", "{team}-q").with_slot(
            SlotKind::Team,
            SlotRule {
                pattern: Some("[a-z".to_string()),
                default: None,
            },
        );
        let err = CompiledPattern::compile(def).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidConstraint { slot: SlotKind::Team, .. }));
    }

    #[test]
    fn test_pattern_document_deserializes() {
        let yaml = r#"
id: k8s-deployment-prod
resource_type: k8s-deployment
environment: prod
template: "{environment}-{team}-{service}-{resourceType}-{version}"
resource_token: deploy
slots:
  team:
    pattern: "[a-z]+"
  version:
    default: v2
"#;
        let def: NamingPattern = serde_yml::from_str(yaml).unwrap();
        assert_eq!(def.uniqueness_scope, "environment");
        assert!(def.allow_suffix);
        assert_eq!(def.slots[&SlotKind::Version].default.as_deref(), Some("v2"));

        let compiled = CompiledPattern::compile(def).unwrap();
        assert!(!compiled.slot_matches(SlotKind::Team, "team1"));
        assert_eq!(
            compiled.default_for(SlotKind::Version, "prod").as_deref(),
            Some("2")
        );
    }
}
