//! `ngt generate` command - build a compliant name from structured inputs

use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use serde_json::json;

use crate::cli::error::{CommandError, Outcome};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::session::Session;
use crate::cli::GlobalOpts;
use crate::core::{AuditEvent, AuditOutcome};
use crate::naming::{GenerationRequest, GenerationResult, Generator, ResolvedSlot};

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Resource type (e.g., k8s-deployment)
    #[arg(long, short = 'r')]
    pub resource_type: String,

    /// Target environment (e.g., prod)
    #[arg(long, short = 'e')]
    pub environment: String,

    /// Owning team
    #[arg(long, short = 't')]
    pub team: Option<String>,

    /// Service name
    #[arg(long, short = 's')]
    pub service: Option<String>,

    /// Version (a leading 'v' is dropped, e.g. v1.0.0 -> 1.0.0)
    #[arg(long = "version", value_name = "VERSION")]
    pub resource_version: Option<String>,

    /// Append a compact timestamp suffix
    #[arg(long)]
    pub timestamp: bool,

    /// Generate N distinct candidates
    #[arg(long, short = 'n', value_name = "N")]
    pub multiple: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GenerateMetadata<'a> {
    components: &'a [ResolvedSlot],
    pattern: &'a str,
    template: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateReport<'a> {
    success: bool,
    generated_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_names: Option<&'a [String]>,
    resource_type: &'a str,
    environment: &'a str,
    timestamp: DateTime<Utc>,
    metadata: GenerateMetadata<'a>,
}

impl<'a> GenerateReport<'a> {
    fn new(result: &'a GenerationResult) -> Self {
        Self {
            success: true,
            generated_name: result.name(),
            generated_names: (result.names.len() > 1).then_some(result.names.as_slice()),
            resource_type: &result.resource_type,
            environment: &result.environment,
            timestamp: result.generated_at,
            metadata: GenerateMetadata {
                components: &result.slots,
                pattern: &result.pattern_id,
                template: &result.template,
            },
        }
    }
}

pub fn run(args: GenerateArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let generator = Generator::new(session.snapshot()?);

    let mut request = GenerationRequest::new(&args.resource_type, &args.environment);
    if let Some(team) = &args.team {
        request = request.team(team);
    }
    if let Some(service) = &args.service {
        request = request.service(service);
    }
    if let Some(version) = &args.resource_version {
        request = request.version(version);
    }
    if args.timestamp {
        request = request.with_timestamp();
    }
    if let Some(n) = args.multiple {
        request = request.multiple(n);
    }

    let subject = format!("{}/{}", args.resource_type, args.environment);
    let result = match generator.generate(&request) {
        Ok(result) => result,
        Err(e) => {
            session.audit(
                AuditEvent::new(session.author(), "name.generate", subject, AuditOutcome::Failure)
                    .with_details(json!({ "error": e.to_string() })),
            );
            return Err(e.into());
        }
    };

    session.audit(
        AuditEvent::new(session.author(), "name.generate", subject, AuditOutcome::Success)
            .with_details(json!({
                "pattern": result.pattern_id,
                "names": result.names,
            })),
    );

    let report = GenerateReport::new(&result);
    let format = effective_format(global.format, false);
    if !print_structured(&report, format)? {
        print_text(&result);
    }

    Ok(Outcome::Success)
}

fn print_text(result: &GenerationResult) {
    for name in &result.names {
        println!("{} {}", style("✓").green(), style(name).cyan().bold());
    }
    let components: Vec<String> = result
        .slots
        .iter()
        .map(|s| format!("{}={}", s.slot, s.value))
        .collect();
    println!(
        "   {}",
        style(format!(
            "pattern {} ({}) {}",
            result.pattern_id,
            result.template,
            components.join(" ")
        ))
        .dim()
    );
}
