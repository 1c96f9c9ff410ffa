//! Name validator - checks a candidate name against structural rules and the registry
//!
//! Validation never fails with an error: every problem with the *name* is a
//! [`Violation`] in the returned [`ValidationResult`]. Collaborator lookups
//! (team directory, name index) are optional and only ever add violations.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::collaborator::{NameIndex, TeamDirectory};
use crate::naming::pattern::{CompiledPattern, SlotKind};
use crate::naming::registry::PatternRegistry;
use crate::naming::suggest::{self, RepairContext, RepairTable};

/// Minimum name length (inclusive)
pub const MIN_NAME_LENGTH: usize = 3;

/// Maximum name length (inclusive)
pub const MAX_NAME_LENGTH: usize = 63;

/// Number of suggestions attached to an invalid result by default
pub const DEFAULT_MAX_SUGGESTIONS: usize = 3;

static NAME_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+([.-][a-z0-9]+)*$").expect("static regex"));

/// Violation severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Whether a violation of this severity makes a name invalid
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Machine-readable violation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    LengthInvalid,
    InvalidPattern,
    NoPolicyDefined,
    MissingEnvironmentPrefix,
    PatternMismatch,
    UnknownTeam,
    DuplicateName,
    UniquenessUnverified,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::LengthInvalid => "LENGTH_INVALID",
            ViolationCode::InvalidPattern => "INVALID_PATTERN",
            ViolationCode::NoPolicyDefined => "NO_POLICY_DEFINED",
            ViolationCode::MissingEnvironmentPrefix => "MISSING_ENVIRONMENT_PREFIX",
            ViolationCode::PatternMismatch => "PATTERN_MISMATCH",
            ViolationCode::UnknownTeam => "UNKNOWN_TEAM",
            ViolationCode::DuplicateName => "DUPLICATE_NAME",
            ViolationCode::UniquenessUnverified => "UNIQUENESS_UNVERIFIED",
        }
    }

    /// Severity this code is reported with
    pub fn severity(&self) -> Severity {
        match self {
            ViolationCode::LengthInvalid | ViolationCode::InvalidPattern => Severity::Critical,
            ViolationCode::MissingEnvironmentPrefix
            | ViolationCode::PatternMismatch
            | ViolationCode::DuplicateName => Severity::Error,
            ViolationCode::NoPolicyDefined
            | ViolationCode::UnknownTeam
            | ViolationCode::UniquenessUnverified => Severity::Warning,
        }
    }
}

impl std::fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ViolationCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s.to_uppercase().as_str() {
            "LENGTH_INVALID" => ViolationCode::LengthInvalid,
            "INVALID_PATTERN" => ViolationCode::InvalidPattern,
            "NO_POLICY_DEFINED" => ViolationCode::NoPolicyDefined,
            "MISSING_ENVIRONMENT_PREFIX" => ViolationCode::MissingEnvironmentPrefix,
            "PATTERN_MISMATCH" => ViolationCode::PatternMismatch,
            "UNKNOWN_TEAM" => ViolationCode::UnknownTeam,
            "DUPLICATE_NAME" => ViolationCode::DuplicateName,
            "UNIQUENESS_UNVERIFIED" => ViolationCode::UniquenessUnverified,
            _ => return Err(format!("Unknown violation code: {}", s)),
        };
        Ok(code)
    }
}

/// A single rule failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub code: ViolationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl Violation {
    pub fn new(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            suggested_fix: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// Outcome of validating one name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff no violation is critical or error
    pub valid: bool,
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Pattern the name was checked against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    /// Slot values recovered from the name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<SlotKind, String>,
}

impl ValidationResult {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: !violations.iter().any(|v| v.severity.is_blocking()),
            violations,
            suggestions: Vec::new(),
            pattern_id: None,
            slots: BTreeMap::new(),
        }
    }

    pub fn has_code(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.severity.is_blocking())
    }
}

/// Optional collaborators consulted during validation
#[derive(Clone, Copy, Default)]
pub struct ValidationContext<'a> {
    pub teams: Option<&'a dyn TeamDirectory>,
    pub names: Option<&'a dyn NameIndex>,
    /// Owner on whose behalf the name is checked; a claim by this owner is not a duplicate
    pub owner: Option<&'a str>,
}

impl<'a> ValidationContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_teams(mut self, teams: &'a dyn TeamDirectory) -> Self {
        self.teams = Some(teams);
        self
    }

    pub fn with_names(mut self, names: &'a dyn NameIndex) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_owner(mut self, owner: &'a str) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Validates names against one registry snapshot
pub struct Validator {
    registry: Arc<PatternRegistry>,
    repairs: RepairTable,
    max_suggestions: usize,
}

impl Validator {
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self {
            registry,
            repairs: RepairTable::default(),
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    pub fn with_repairs(mut self, repairs: RepairTable) -> Self {
        self.repairs = repairs;
        self
    }

    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    /// Validate a name, attaching ranked suggestions when it is invalid
    pub fn validate(
        &self,
        name: &str,
        resource_type: &str,
        environment: &str,
        ctx: &ValidationContext<'_>,
    ) -> ValidationResult {
        let mut result = self.check(name, resource_type, environment, ctx);
        if !result.valid {
            result.suggestions = self.suggest_with(
                name,
                resource_type,
                environment,
                &result.violations,
                ctx,
            );
            result.suggestions.truncate(self.max_suggestions);
        }
        result
    }

    /// Run every check without computing suggestions
    pub fn check(
        &self,
        name: &str,
        resource_type: &str,
        environment: &str,
        ctx: &ValidationContext<'_>,
    ) -> ValidationResult {
        let mut violations = Vec::new();

        let length = name.chars().count();
        if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
            violations.push(
                Violation::new(
                    ViolationCode::LengthInvalid,
                    format!(
                        "Name is {} characters; allowed range is {}-{}",
                        length, MIN_NAME_LENGTH, MAX_NAME_LENGTH
                    ),
                )
                .with_fix(if length > MAX_NAME_LENGTH {
                    "shorten the team or service component"
                } else {
                    "use a longer, more descriptive name"
                }),
            );
        }

        let charset_ok = NAME_CHARSET.is_match(name);
        if !charset_ok {
            violations.push(
                Violation::new(ViolationCode::InvalidPattern, charset_message(name))
                    .with_fix("use lowercase letters and digits joined by single '-' or '.', starting and ending with a letter or digit"),
            );
        }

        let pattern = match self.registry.resolve(resource_type, environment) {
            Ok(pattern) => pattern,
            Err(_) => {
                violations.push(Violation::new(
                    ViolationCode::NoPolicyDefined,
                    format!(
                        "No naming policy defined for resource type '{}' in environment '{}'",
                        resource_type, environment
                    ),
                ));
                return ValidationResult::from_violations(violations);
            }
        };

        let mut slots = BTreeMap::new();
        if charset_ok {
            if let Some(parts) = check_structure(pattern, name, environment, &mut violations) {
                check_team(ctx, &parts, &mut violations);
                check_uniqueness(ctx, pattern, name, environment, &parts, &mut violations);
                slots = parts;
            }
        }

        let mut result = ValidationResult::from_violations(violations);
        result.pattern_id = Some(pattern.id().to_string());
        result.slots = slots;

        tracing::trace!(
            name,
            resource_type,
            environment,
            valid = result.valid,
            violations = result.violations.len(),
            "name checked"
        );

        result
    }

    /// Repair candidates for a failed validation, using no collaborators
    pub fn suggest(
        &self,
        name: &str,
        resource_type: &str,
        environment: &str,
        violations: &[Violation],
    ) -> Vec<String> {
        self.suggest_with(
            name,
            resource_type,
            environment,
            violations,
            &ValidationContext::default(),
        )
    }

    /// Repair candidates, re-validated with the given collaborators
    pub fn suggest_with(
        &self,
        name: &str,
        resource_type: &str,
        environment: &str,
        violations: &[Violation],
        ctx: &ValidationContext<'_>,
    ) -> Vec<String> {
        let pattern = self.registry.resolve(resource_type, environment).ok().cloned();
        let repair_ctx = RepairContext {
            environment_prefix: pattern
                .as_ref()
                .and_then(|p| p.environment_prefix(environment)),
            pattern,
        };

        suggest::suggest(name, violations, &self.repairs, &repair_ctx, |candidate| {
            self.check(candidate, resource_type, environment, ctx)
        })
    }
}

fn charset_message(name: &str) -> String {
    let separators = ['-', '.'];
    if name.starts_with(separators) || name.ends_with(separators) {
        "Name must start and end with a lowercase letter or digit".to_string()
    } else if name.chars().any(|c| c.is_ascii_uppercase()) {
        "Name must be lowercase".to_string()
    } else if ["--", "..", "-.", ".-"].iter().any(|run| name.contains(run)) {
        "Name must not contain consecutive separators".to_string()
    } else {
        "Name may only contain lowercase letters, digits, '-' and '.'".to_string()
    }
}

fn check_structure(
    pattern: &CompiledPattern,
    name: &str,
    environment: &str,
    violations: &mut Vec<Violation>,
) -> Option<BTreeMap<SlotKind, String>> {
    if let Some(prefix) = pattern.environment_prefix(environment) {
        if !name.starts_with(&prefix) {
            violations.push(
                Violation::new(
                    ViolationCode::MissingEnvironmentPrefix,
                    format!("Name must start with the environment prefix '{}'", prefix),
                )
                .with_fix(format!("{}{}", prefix, name)),
            );
            return None;
        }
    }

    match pattern.decompose(name) {
        Some(parts) => Some(parts.slots),
        None => {
            violations.push(
                Violation::new(
                    ViolationCode::PatternMismatch,
                    format!(
                        "Name does not match pattern '{}' ({})",
                        pattern.id(),
                        pattern.template()
                    ),
                )
                .with_fix(format!("follow the template {}", pattern.template())),
            );
            None
        }
    }
}

fn check_team(
    ctx: &ValidationContext<'_>,
    slots: &BTreeMap<SlotKind, String>,
    violations: &mut Vec<Violation>,
) {
    let (Some(teams), Some(team)) = (ctx.teams, slots.get(&SlotKind::Team)) else {
        return;
    };

    match teams.is_known_team(team) {
        Ok(true) => {}
        Ok(false) => violations.push(Violation::new(
            ViolationCode::UnknownTeam,
            format!("Team '{}' is not registered in the team directory", team),
        )),
        Err(e) => violations.push(Violation::new(
            ViolationCode::UnknownTeam,
            format!("Team '{}' could not be verified: {}", team, e),
        )),
    }
}

fn check_uniqueness(
    ctx: &ValidationContext<'_>,
    pattern: &CompiledPattern,
    name: &str,
    environment: &str,
    slots: &BTreeMap<SlotKind, String>,
    violations: &mut Vec<Violation>,
) {
    let Some(index) = ctx.names else {
        return;
    };

    let scope = pattern.scope_key(environment, slots);
    match index.owner_of(&scope, name) {
        Ok(Some(owner)) if ctx.owner != Some(owner.as_str()) => violations.push(Violation::new(
            ViolationCode::DuplicateName,
            format!("Name is already claimed by '{}' in scope '{}'", owner, scope),
        )),
        Ok(_) => {}
        Err(e) => violations.push(Violation::new(
            ViolationCode::UniquenessUnverified,
            format!("Uniqueness could not be verified: {}", e),
        )),
    }
}
