//! `ngt claim` command - record ownership of a validated name

use console::style;
use serde::Serialize;
use serde_json::json;

use crate::cli::error::{CommandError, Outcome};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::session::Session;
use crate::cli::GlobalOpts;
use crate::core::{AuditEvent, AuditOutcome, ClaimOutcome, NameIndex};
use crate::naming::{ValidationContext, Validator};

#[derive(clap::Args, Debug)]
pub struct ClaimArgs {
    /// Resource name to claim
    pub name: String,

    /// Resource type (e.g., k8s-deployment)
    #[arg(long, short = 'r')]
    pub resource_type: String,

    /// Target environment (e.g., prod)
    #[arg(long, short = 'e')]
    pub environment: String,

    /// Owner recorded for the name (default: the configured author)
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClaimReport {
    name: String,
    scope: String,
    owner: String,
    claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflict_owner: Option<String>,
}

pub fn run(args: ClaimArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    session.require_project()?;

    let registry = session.snapshot()?;
    let index = session
        .name_index()?
        .ok_or_else(|| CommandError::usage("claims need a project name index"))?;
    let teams = session.teams()?;
    let owner = args.owner.clone().unwrap_or_else(|| session.author());

    // Without a pattern there is no uniqueness scope to claim in
    let pattern = registry
        .resolve(&args.resource_type, &args.environment)
        .map_err(|_| {
            CommandError::usage(format!(
                "no naming pattern for resource type '{}' in environment '{}'; names of this kind cannot be claimed",
                args.resource_type, args.environment
            ))
        })?
        .clone();

    // Uniqueness is settled by the claim itself; only the shape of the name is checked here
    let mut ctx = ValidationContext::new();
    if let Some(teams) = &teams {
        ctx = ctx.with_teams(teams);
    }
    let validator = Validator::new(registry.clone());
    let result = validator.validate(&args.name, &args.resource_type, &args.environment, &ctx);

    if !result.valid {
        println!(
            "{} {} cannot be claimed: it is not a valid name",
            style("✗").red(),
            style(&args.name).cyan()
        );
        for v in result.violations.iter().filter(|v| v.severity.is_blocking()) {
            println!("  {} {:<28} {}", style("✗").red(), v.code.to_string(), v.message);
        }
        return Ok(Outcome::Invalid);
    }

    let scope = pattern.scope_key(&args.environment, &result.slots);

    let claimed = index.claim(&scope, &args.name, &owner);
    let outcome = match claimed {
        Ok(outcome) => outcome,
        Err(e) => {
            session.audit(
                AuditEvent::new(&owner, "name.claim", &args.name, AuditOutcome::Failure)
                    .with_details(json!({ "scope": scope, "error": e.to_string() })),
            );
            return Err(e.into());
        }
    };

    let conflict_owner = match &outcome {
        ClaimOutcome::Conflict { owner } => Some(owner.clone()),
        _ => None,
    };
    session.audit(
        AuditEvent::new(
            &owner,
            "name.claim",
            &args.name,
            if conflict_owner.is_some() {
                AuditOutcome::Denied
            } else {
                AuditOutcome::Success
            },
        )
        .with_details(json!({ "scope": scope, "conflict_owner": conflict_owner })),
    );

    let report = ClaimReport {
        name: args.name.clone(),
        scope,
        owner,
        claimed: conflict_owner.is_none(),
        conflict_owner,
    };

    let format = effective_format(global.format, false);
    if !print_structured(&report, format)? {
        match &outcome {
            ClaimOutcome::Claimed => println!(
                "{} Claimed {} for {} ({})",
                style("✓").green(),
                style(&report.name).cyan(),
                style(&report.owner).yellow(),
                report.scope
            ),
            ClaimOutcome::AlreadyOwned => println!(
                "{} {} is already owned by {}",
                style("✓").green(),
                style(&report.name).cyan(),
                style(&report.owner).yellow()
            ),
            ClaimOutcome::Conflict { owner } => println!(
                "{} {} is already claimed by {} ({})",
                style("✗").red(),
                style(&report.name).cyan(),
                style(owner).yellow(),
                report.scope
            ),
        }
    }

    Ok(if report.claimed {
        Outcome::Success
    } else {
        Outcome::Invalid
    })
}
