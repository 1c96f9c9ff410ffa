//! `ngt exception` command - exception request management

use chrono::{DateTime, Datelike, Utc};
use clap::Subcommand;
use console::style;
use serde::Serialize;
use serde_json::json;

use crate::cli::commands::request::{self, history_line, parse_id, FireArgs, ListArgs, ShowArgs};
use crate::cli::error::{CommandError, Outcome};
use crate::cli::helpers::parse_datetime;
use crate::cli::output::{effective_format, print_structured};
use crate::cli::session::Session;
use crate::cli::GlobalOpts;
use crate::core::{AuditEvent, AuditOutcome, RequestPrefix};
use crate::naming::ViolationCode;
use crate::workflow::{
    exception_table, expired_exceptions, ChangeRequest, ExceptionEvent, ExceptionRequest,
    ExceptionState, ExceptionType, LoggingActionHandler, Payload, RequestStore, WorkflowEngine,
};

#[derive(Subcommand, Debug)]
pub enum ExceptionCommands {
    /// Create a new exception request (state: requested)
    New(NewArgs),

    /// Show an exception request
    Show(ShowArgs),

    /// List exception requests
    List(ListArgs),

    /// Fire a workflow event (review, approve, deny, activate, expire, revoke)
    Fire(FireArgs),

    /// List live exceptions whose validity window has closed
    Expired(ExpiredArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Title
    #[arg(long, short = 't')]
    pub title: String,

    /// Exception type (temporary/standard/permanent)
    #[arg(long = "type", default_value = "temporary")]
    pub exception_type: ExceptionType,

    /// Start of the validity window (YYYY-MM-DD or RFC 3339; default: now)
    #[arg(long, value_parser = parse_datetime)]
    pub start: Option<DateTime<Utc>>,

    /// End of the validity window (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_datetime)]
    pub end: Option<DateTime<Utc>>,

    /// Resource name the exception applies to
    #[arg(long, short = 'r')]
    pub resource: Option<String>,

    /// Violation code to waive (repeatable, e.g. MISSING_ENVIRONMENT_PREFIX)
    #[arg(long = "waive", value_name = "CODE")]
    pub waive: Vec<ViolationCode>,

    /// Change request this exception belongs to
    #[arg(long, value_name = "CHG-ID")]
    pub link: Option<String>,

    /// Why the exception is needed
    #[arg(long, short = 'j')]
    pub justification: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ExpiredArgs {
    /// Evaluate expiry at this time instead of now
    #[arg(long, value_parser = parse_datetime)]
    pub at: Option<DateTime<Utc>>,

    /// Fire `expire` on every active exception found
    #[arg(long)]
    pub apply: bool,
}

#[derive(Debug, Serialize)]
struct ExpiredReport {
    at: DateTime<Utc>,
    expired: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    applied: Vec<String>,
}

pub fn run(cmd: ExceptionCommands, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    match cmd {
        ExceptionCommands::New(args) => run_new(args, global),
        ExceptionCommands::Show(args) => run_show(args, global),
        ExceptionCommands::List(args) => run_list(args, global),
        ExceptionCommands::Fire(args) => {
            let session = Session::open(global)?;
            request::fire(&session, exception_table(), args)
        }
        ExceptionCommands::Expired(args) => run_expired(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ExceptionRequest>(&session)?;

    let now = Utc::now();
    let ids = store.lock_ids()?;
    let id = store.next_id(now.year())?;
    let mut exception =
        ExceptionRequest::new(id, args.title, args.exception_type, session.author(), now)
            .with_waived_codes(args.waive);

    match (args.start, args.end) {
        (start, Some(end)) => exception = exception.with_duration(start.unwrap_or(now), end),
        (Some(_), None) => return Err(CommandError::usage("--start requires --end")),
        (None, None) => {}
    }
    if let Some(resource) = args.resource {
        exception = exception.with_resource(resource);
    }
    if let Some(justification) = args.justification {
        exception = exception.with_justification(justification);
    }
    if let Some(link) = &args.link {
        let change_id = parse_id(link)?;
        if change_id.prefix() != RequestPrefix::Chg {
            return Err(CommandError::usage(format!(
                "--link expects a change request ID, got {}",
                change_id
            )));
        }
        // The linked change must exist
        request::open_store::<ChangeRequest>(&session)?.load(change_id)?;
        exception = exception.linked_to(change_id);
    }

    request::create(&session, &store, &exception, global)?;
    drop(ids);
    Ok(Outcome::Success)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ExceptionRequest>(&session)?;
    let exception = store.load(parse_id(&args.id)?)?;
    let engine = WorkflowEngine::new(exception_table())?;

    let mut details = vec![("Type", exception.exception_type.to_string())];
    if let Some(d) = &exception.duration {
        details.push((
            "Valid",
            format!(
                "{} to {}",
                d.start.format("%Y-%m-%d %H:%M"),
                d.end.format("%Y-%m-%d %H:%M")
            ),
        ));
    }
    if let Some(resource) = &exception.resource_name {
        details.push(("Resource", resource.clone()));
    }
    if !exception.waived_codes.is_empty() {
        let codes: Vec<&str> = exception.waived_codes.iter().map(|c| c.as_str()).collect();
        details.push(("Waives", codes.join(", ")));
    }
    if let Some(change) = exception.linked_change_id {
        details.push(("Change", change.to_string()));
    }
    if let Some(justification) = &exception.justification {
        details.push(("Justification", justification.clone()));
    }
    if !exception.approvals.is_empty() {
        let approvers: Vec<&str> = exception
            .approvals
            .iter()
            .map(|a| a.approver.as_str())
            .collect();
        details.push(("Approved by", approvers.join(", ")));
    }
    if let Some(denial) = exception.rejections.last() {
        details.push((
            "Denied by",
            match &denial.reason {
                Some(reason) => format!("{} ({})", denial.actor, reason),
                None => denial.actor.clone(),
            },
        ));
    }

    let history: Vec<String> = exception.history.iter().map(history_line).collect();
    request::show(&exception, &engine, &details, &history, global)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ExceptionRequest>(&session)?;
    let exceptions = store.list()?;
    request::list(&exceptions, args.state.as_deref(), global)
}

fn run_expired(args: ExpiredArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ExceptionRequest>(&session)?;
    let at = args.at.unwrap_or_else(Utc::now);

    let exceptions = store.list()?;
    let expired = expired_exceptions(at, &exceptions);

    let mut applied = Vec::new();
    if args.apply {
        let engine = WorkflowEngine::new(exception_table())?;
        let actor = session.author();
        let payload = Payload::new(&actor, at);

        for id in exceptions
            .iter()
            .filter(|e| expired.contains(&e.id) && e.state == ExceptionState::Active)
            .map(|e| e.id)
        {
            // Re-read under the lock; another process may have moved it on
            let _lock = store.lock(id)?;
            let mut exception = store.load(id)?;
            if exception.state != ExceptionState::Active {
                continue;
            }
            match engine.fire(&mut exception, ExceptionEvent::Expire, &payload, &LoggingActionHandler) {
                Ok(_) => {
                    store.save(&exception)?;
                    session.audit(AuditEvent::new(
                        &actor,
                        "exception.expire",
                        id.to_string(),
                        AuditOutcome::Success,
                    ));
                    applied.push(id.to_string());
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "exception not expired");
                    session.audit(
                        AuditEvent::new(&actor, "exception.expire", id.to_string(), AuditOutcome::Denied)
                            .with_details(json!({ "error": e.to_string() })),
                    );
                }
            }
        }
    }

    let report = ExpiredReport {
        at,
        expired: expired.iter().map(|id| id.to_string()).collect(),
        applied,
    };

    let format = effective_format(global.format, false);
    if print_structured(&report, format)? {
        return Ok(Outcome::Success);
    }

    if report.expired.is_empty() {
        println!("{} No expired exceptions", style("✓").green());
        return Ok(Outcome::Success);
    }

    for id in &report.expired {
        let mark = if report.applied.contains(id) {
            style("expired").green().to_string()
        } else {
            style("past end").yellow().to_string()
        };
        println!("{} {} {}", style("!").yellow(), style(id).cyan(), mark);
    }
    println!(
        "{} expired exception(s), {} transitioned",
        report.expired.len(),
        report.applied.len()
    );
    Ok(Outcome::Success)
}
