//! `ngt validate` command - check a resource name against the naming policy

use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use serde_json::json;

use crate::cli::error::{CommandError, Outcome};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::session::Session;
use crate::cli::GlobalOpts;
use crate::core::{AuditEvent, AuditOutcome, NameIndex, UnavailableNameIndex};
use crate::naming::{Severity, ValidationContext, ValidationResult, Validator};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Resource name to validate
    pub name: String,

    /// Resource type (e.g., k8s-deployment)
    #[arg(long, short = 'r')]
    pub resource_type: String,

    /// Target environment (e.g., prod)
    #[arg(long, short = 'e')]
    pub environment: String,

    /// Owner checking the name; a name already claimed by this owner is not a duplicate
    #[arg(long)]
    pub owner: Option<String>,

    /// Strict mode - warnings also fail validation
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Serialize)]
struct ViolationReport {
    severity: Severity,
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidateReport {
    valid: bool,
    resource_name: String,
    resource_type: String,
    environment: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    violations: Vec<ViolationReport>,
    suggestions: Vec<String>,
}

impl ValidateReport {
    fn new(args: &ValidateArgs, result: &ValidationResult, valid: bool) -> Self {
        Self {
            valid,
            resource_name: args.name.clone(),
            resource_type: args.resource_type.clone(),
            environment: args.environment.clone(),
            timestamp: Utc::now(),
            pattern: result.pattern_id.clone(),
            violations: result
                .violations
                .iter()
                .map(|v| ViolationReport {
                    severity: v.severity,
                    code: v.code.to_string(),
                    message: v.message.clone(),
                    suggestion: v.suggested_fix.clone(),
                })
                .collect(),
            suggestions: result.suggestions.clone(),
        }
    }
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let config = session.config();

    let validator = Validator::new(session.snapshot()?)
        .with_max_suggestions(config.validation.max_suggestions);

    let teams = session.teams()?;
    let index: Box<dyn NameIndex> = match session.name_index() {
        Ok(Some(index)) => Box::new(index),
        Ok(None) => Box::new(UnavailableNameIndex::new("no project name index")),
        Err(e) => {
            tracing::warn!(error = %e, "name index unavailable; uniqueness is unverified");
            Box::new(UnavailableNameIndex::new(e.to_string()))
        }
    };

    let mut ctx = ValidationContext::new();
    if let Some(teams) = &teams {
        ctx = ctx.with_teams(teams);
    }
    if session.project().is_some() {
        ctx = ctx.with_names(index.as_ref());
    }
    if let Some(owner) = &args.owner {
        ctx = ctx.with_owner(owner);
    }

    let result = validator.validate(&args.name, &args.resource_type, &args.environment, &ctx);

    let strict = args.strict || config.validation.strict;
    let valid = result.valid && !(strict && result.warnings().next().is_some());

    session.audit(
        AuditEvent::new(
            session.author(),
            "name.validate",
            &args.name,
            if valid {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            },
        )
        .with_details(json!({
            "resource_type": args.resource_type,
            "environment": args.environment,
            "pattern": result.pattern_id,
            "codes": result.violations.iter().map(|v| v.code.as_str()).collect::<Vec<_>>(),
        })),
    );

    let report = ValidateReport::new(&args, &result, valid);
    let format = effective_format(global.format, false);
    if !print_structured(&report, format)? {
        print_text(&report);
    }

    Ok(if valid { Outcome::Success } else { Outcome::Invalid })
}

fn print_text(report: &ValidateReport) {
    if report.valid {
        println!(
            "{} {} is valid{}",
            style("✓").green(),
            style(&report.resource_name).cyan(),
            report
                .pattern
                .as_ref()
                .map(|p| format!(" (pattern {})", p))
                .unwrap_or_default()
        );
    } else {
        println!(
            "{} {} is invalid",
            style("✗").red(),
            style(&report.resource_name).cyan()
        );
    }

    for v in &report.violations {
        let mark = if v.severity <= Severity::Error {
            style("✗").red()
        } else {
            style("!").yellow()
        };
        println!(
            "  {} {:<8} {:<28} {}",
            mark,
            v.severity.to_string(),
            v.code,
            v.message
        );
        if let Some(fix) = &v.suggestion {
            println!("      {} {}", style("→").blue(), style(fix).dim());
        }
    }

    if !report.suggestions.is_empty() {
        println!();
        println!("{}", style("Suggestions:").bold());
        for s in &report.suggestions {
            println!("  {} {}", style("→").blue(), style(s).green());
        }
    }
}
