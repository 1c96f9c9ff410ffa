//! Shared plumbing for `ngt change` and `ngt exception`

use console::style;
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;
use tabled::Tabled;

use crate::cli::error::{CommandError, Outcome};
use crate::cli::helpers::{format_date, truncate_str};
use crate::cli::output::{effective_format, print_rows, print_structured};
use crate::cli::session::Session;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{AuditEvent, AuditOutcome, RequestId};
use crate::workflow::{
    LoggingActionHandler, Payload, Request, RequestStore, SharedInstance, TransitionError,
    TransitionRecord, TransitionTable, Workflow, WorkflowEngine, YamlRequestStore,
};

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Request ID (e.g., CHG-2026-001)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only show requests in this state
    #[arg(long, short = 's')]
    pub state: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct FireArgs {
    /// Request ID (e.g., CHG-2026-001)
    pub id: String,

    /// Event to fire (e.g., submit, approve)
    pub event: String,

    /// Comment recorded with the transition (rejection reason, approval note)
    #[arg(long, short = 'm')]
    pub comment: Option<String>,

    /// Fail instead of firing if the request is no longer in this state
    #[arg(long, value_name = "STATE")]
    pub expect: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct RequestRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "TITLE")]
    pub title: String,
    #[tabled(rename = "STATE")]
    pub state: String,
    #[tabled(rename = "REQUESTER")]
    pub requester: String,
    #[tabled(rename = "CREATED")]
    pub created: String,
}

impl RequestRow {
    fn new<R: Request>(request: &R) -> Self {
        Self {
            id: request.request_id().to_string(),
            title: truncate_str(request.title(), 40),
            state: request.state_label().to_string(),
            requester: request.requester().to_string(),
            created: format_date(&request.created()),
        }
    }
}

/// Store for one request type inside the current project
pub fn open_store<R: Request>(session: &Session) -> Result<YamlRequestStore<R>, CommandError> {
    let project = session.require_project()?;
    Ok(YamlRequestStore::new(project.requests_dir(R::PREFIX)))
}

pub fn parse_id(raw: &str) -> Result<RequestId, CommandError> {
    Ok(RequestId::parse(raw.trim())?)
}

/// One history line: `2026-01-02 10:00 draft → submitted (submit) by alice: note`
pub fn history_line<S, E>(record: &TransitionRecord<S, E>) -> String
where
    S: std::fmt::Display,
    E: std::fmt::Display,
{
    let mut line = format!(
        "{} {} → {} ({}) by {}",
        record.at.format("%Y-%m-%d %H:%M"),
        record.from,
        record.to,
        record.event,
        record.actor
    );
    if let Some(comment) = &record.comment {
        line.push_str(": ");
        line.push_str(comment);
    }
    line
}

fn parse_label<T: FromStr<Err = String>>(raw: &str) -> Result<T, CommandError> {
    raw.parse().map_err(CommandError::Usage)
}

/// Print one request, the events it can take next and its history
pub fn show<W>(
    request: &W,
    engine: &WorkflowEngine<W>,
    details: &[(&str, String)],
    history: &[String],
    global: &GlobalOpts,
) -> Result<Outcome, CommandError>
where
    W: Workflow + Request,
{
    let format = effective_format(global.format, false);
    if print_structured(request, format)? {
        return Ok(Outcome::Success);
    }

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {}",
        style("ID").bold(),
        style(request.request_id()).cyan()
    );
    println!("{}: {}", style("Title").bold(), style(request.title()).yellow());
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("State").bold(), request.state());
    println!("{}: {}", style("Requester").bold(), request.requester());
    println!(
        "{}: {}",
        style("Created").bold(),
        request.created().format("%Y-%m-%d %H:%M")
    );
    for (label, value) in details {
        println!("{}: {}", style(label).bold(), value);
    }

    let events = engine.available_events(request.state());
    if engine.is_terminal(request.state()) {
        println!("{}: {}", style("Next").bold(), style("none (terminal)").dim());
    } else if !events.is_empty() {
        let labels: Vec<String> = events.iter().map(|e| e.to_string()).collect();
        println!("{}: {}", style("Next").bold(), labels.join(", "));
    }

    if !history.is_empty() {
        println!();
        println!("{}", style("History:").bold());
        for line in history {
            println!("  {}", line);
        }
    }

    Ok(Outcome::Success)
}

/// Print requests as a table, optionally filtered by state label
pub fn list<R: Request>(
    requests: &[R],
    state: Option<&str>,
    global: &GlobalOpts,
) -> Result<Outcome, CommandError> {
    let wanted = state.map(|s| s.trim().to_lowercase().replace('-', "_"));
    let rows: Vec<RequestRow> = requests
        .iter()
        .filter(|r| wanted.as_deref().map_or(true, |s| r.state_label() == s))
        .map(RequestRow::new)
        .collect();

    let format = effective_format(global.format, true);
    if rows.is_empty() && !matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        println!("No requests found.");
        return Ok(Outcome::Success);
    }

    print_rows(&rows, format)?;
    Ok(Outcome::Success)
}

/// Load a request, fire an event at it and persist the result
///
/// Load, fire and save run under the request's lock so a concurrent `ngt`
/// process sees either the old or the new document, never a lost update. The
/// updated document is only written when the transition commits. Every
/// attempt is audited as `<kind>.<event>`.
pub fn fire<W>(
    session: &Session,
    table: TransitionTable<W>,
    args: FireArgs,
) -> Result<Outcome, CommandError>
where
    W: Workflow + Request + Clone,
    W::Event: FromStr<Err = String>,
    W::State: FromStr<Err = String>,
{
    let store = open_store::<W>(session)?;
    let id = parse_id(&args.id)?;
    let event: W::Event = parse_label(&args.event)?;
    let expected: Option<W::State> = args
        .expect
        .as_deref()
        .map(parse_label::<W::State>)
        .transpose()?;

    let engine = WorkflowEngine::new(table)?;
    let lock = store.lock(id)?;
    let instance = SharedInstance::new(store.load(id)?);

    let actor = session.author();
    let mut payload = Payload::now(&actor);
    if let Some(comment) = &args.comment {
        payload = payload.with_comment(comment);
    }

    let handler = LoggingActionHandler;
    let fired = match expected {
        Some(state) => instance.fire_expecting(&engine, state, event, &payload, &handler),
        None => instance.fire(&engine, event, &payload, &handler),
    };
    let action = format!("{}.{}", W::KIND, event);

    let outcome = match fired {
        Ok(outcome) => outcome,
        Err(e) => {
            session.audit(
                AuditEvent::new(&actor, &action, id.to_string(), AuditOutcome::Denied)
                    .with_details(json!({
                        "state": instance.state().to_string(),
                        "error": e.to_string(),
                    })),
            );
            if let TransitionError::GuardFailed { guard } = &e {
                println!("{} {} refused by {}", style("✗").red(), id, style(guard).yellow());
            }
            return Err(e.into());
        }
    };

    let updated = instance.into_inner();
    store.save(&updated)?;
    drop(lock);

    session.audit(
        AuditEvent::new(&actor, &action, id.to_string(), AuditOutcome::Success).with_details(
            json!({
                "from": outcome.from.to_string(),
                "to": outcome.to.to_string(),
                "comment": args.comment,
                "action_failures": outcome.action_failures,
            }),
        ),
    );

    println!(
        "{} {} {} {} {}",
        style("✓").green(),
        style(id).cyan(),
        outcome.from,
        style("→").blue(),
        style(outcome.to).green().bold()
    );
    for failure in &outcome.action_failures {
        println!(
            "  {} action {} failed: {}",
            style("!").yellow(),
            failure.action,
            failure.error
        );
    }

    Ok(Outcome::Success)
}

/// Validate and persist a newly built request, then print it
///
/// The caller holds [`YamlRequestStore::lock_ids`] from ID allocation until
/// this returns.
pub fn create<R: Request + Workflow>(
    session: &Session,
    store: &YamlRequestStore<R>,
    request: &R,
    global: &GlobalOpts,
) -> Result<(), CommandError> {
    let action = format!("{}.create", R::KIND);

    if let Err(e) = request.check() {
        session.audit(
            AuditEvent::new(
                session.author(),
                &action,
                request.request_id().to_string(),
                AuditOutcome::Denied,
            )
            .with_details(json!({ "error": e.to_string() })),
        );
        return Err(e.into());
    }

    store.create(request)?;
    session.audit(AuditEvent::new(
        session.author(),
        &action,
        request.request_id().to_string(),
        AuditOutcome::Success,
    ));

    let format = effective_format(global.format, false);
    if !print_structured(request, format)? {
        println!(
            "{} Created {} {}",
            style("✓").green(),
            style(request.request_id()).cyan(),
            style(request.title()).yellow()
        );
    }
    Ok(())
}

/// Wrap a prompt failure (closed terminal, interrupted input)
pub fn prompt_error(e: dialoguer::Error) -> CommandError {
    CommandError::Io(std::io::Error::other(e))
}
