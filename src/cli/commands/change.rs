//! `ngt change` command - change request management

use chrono::{Datelike, Utc};
use clap::Subcommand;
use dialoguer::{theme::ColorfulTheme, Input, Select};

use crate::cli::commands::request::{
    self, history_line, parse_id, prompt_error, FireArgs, ListArgs, ShowArgs,
};
use crate::cli::error::{CommandError, Outcome};
use crate::cli::session::Session;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::workflow::{
    change_table, ChangeRequest, ChangeType, RequestStore, RiskLevel, WorkflowEngine,
};

#[derive(Subcommand, Debug)]
pub enum ChangeCommands {
    /// Create a new change request (state: draft)
    New(NewArgs),

    /// Show a change request
    Show(ShowArgs),

    /// List change requests
    List(ListArgs),

    /// Fire a workflow event (submit, assess_risk, approve, reject, implement, close, roll_back)
    Fire(FireArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Title
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Change type (standard/normal/emergency)
    #[arg(long = "type", default_value = "normal")]
    pub change_type: ChangeType,

    /// Risk level (critical/high/medium/low)
    #[arg(long, default_value = "medium")]
    pub risk: RiskLevel,

    /// Rollback plan (required before submission for high and critical risk)
    #[arg(long)]
    pub rollback_plan: Option<String>,

    /// Description of the change
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Resource names affected by the change (repeatable)
    #[arg(long = "resource", value_name = "NAME")]
    pub resources: Vec<String>,

    /// Use interactive wizard to fill in fields
    #[arg(long, short = 'i')]
    pub interactive: bool,
}

pub fn run(cmd: ChangeCommands, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    match cmd {
        ChangeCommands::New(args) => run_new(args, global),
        ChangeCommands::Show(args) => run_show(args, global),
        ChangeCommands::List(args) => run_list(args, global),
        ChangeCommands::Fire(args) => {
            let session = Session::open(global)?;
            request::fire(&session, change_table(), args)
        }
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ChangeRequest>(&session)?;

    let (title, change_type, risk, rollback_plan) = if args.interactive {
        prompt_fields(&args)?
    } else {
        let title = args
            .title
            .clone()
            .ok_or_else(|| CommandError::usage("--title is required (or use --interactive)"))?;
        (title, args.change_type, args.risk, args.rollback_plan.clone())
    };

    let ids = store.lock_ids()?;
    let id = store.next_id(Utc::now().year())?;
    let mut change = ChangeRequest::new(id, title, change_type, risk, session.author(), Utc::now())
        .with_resources(args.resources);
    if let Some(plan) = rollback_plan {
        change = change.with_rollback_plan(plan);
    }
    if let Some(description) = args.description {
        change = change.with_description(description);
    }

    request::create(&session, &store, &change, global)?;
    drop(ids);

    if !change.has_required_rollback_plan()
        && !matches!(global.format, OutputFormat::Json | OutputFormat::Yaml)
    {
        println!(
            "   {} {} risk: add a rollback plan before submitting",
            console::style("!").yellow(),
            change.risk_level
        );
    }
    Ok(Outcome::Success)
}

fn prompt_fields(
    args: &NewArgs,
) -> Result<(String, ChangeType, RiskLevel, Option<String>), CommandError> {
    let theme = ColorfulTheme::default();

    let mut title_input = Input::<String>::with_theme(&theme).with_prompt("Title");
    if let Some(title) = &args.title {
        title_input = title_input.with_initial_text(title);
    }
    let title = title_input.interact_text().map_err(prompt_error)?;

    let types: Vec<&str> = ChangeType::ALL.iter().map(|t| t.as_str()).collect();
    let type_selection = Select::with_theme(&theme)
        .with_prompt("Change type")
        .items(&types)
        .default(ChangeType::ALL.iter().position(|t| *t == args.change_type).unwrap_or(0))
        .interact()
        .map_err(prompt_error)?;

    let risks: Vec<&str> = RiskLevel::ALL.iter().map(|r| r.as_str()).collect();
    let risk_selection = Select::with_theme(&theme)
        .with_prompt("Risk level")
        .items(&risks)
        .default(RiskLevel::ALL.iter().position(|r| *r == args.risk).unwrap_or(0))
        .interact()
        .map_err(prompt_error)?;

    let change_type = ChangeType::ALL[type_selection];
    let risk = RiskLevel::ALL[risk_selection];

    let plan: String = Input::with_theme(&theme)
        .with_prompt(if risk.requires_rollback_plan() {
            "Rollback plan"
        } else {
            "Rollback plan (optional)"
        })
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_error)?;

    Ok((
        title,
        change_type,
        risk,
        Some(plan).filter(|p| !p.trim().is_empty()),
    ))
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ChangeRequest>(&session)?;
    let change = store.load(parse_id(&args.id)?)?;
    let engine = WorkflowEngine::new(change_table())?;

    let mut details = vec![
        ("Type", change.change_type.to_string()),
        ("Risk", change.risk_level.to_string()),
        (
            "Rollback plan",
            change.rollback_plan.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];
    if let Some(description) = &change.description {
        details.push(("Description", description.clone()));
    }
    if !change.resources.is_empty() {
        details.push(("Resources", change.resources.join(", ")));
    }
    if !change.approvals.is_empty() {
        let approvers: Vec<&str> = change.approvals.iter().map(|a| a.approver.as_str()).collect();
        details.push(("Approved by", approvers.join(", ")));
    }
    if let Some(rejection) = change.rejections.last() {
        details.push((
            "Rejected by",
            match &rejection.reason {
                Some(reason) => format!("{} ({})", rejection.actor, reason),
                None => rejection.actor.clone(),
            },
        ));
    }

    let history: Vec<String> = change.history.iter().map(history_line).collect();
    request::show(&change, &engine, &details, &history, global)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let store = request::open_store::<ChangeRequest>(&session)?;
    let changes = store.list()?;
    request::list(&changes, args.state.as_deref(), global)
}
