//! `ngt patterns` command - inspect and check naming patterns

use clap::Subcommand;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;
use walkdir::WalkDir;

use crate::cli::error::{CommandError, Outcome};
use crate::cli::helpers::truncate_str;
use crate::cli::output::{effective_format, print_rows, print_structured};
use crate::cli::session::Session;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::naming::registry::load_pattern_file;
use crate::naming::{CompiledPattern, NamingPattern, PatternRegistry, SlotKind};
use crate::schema::SchemaRegistry;

#[derive(Subcommand, Debug)]
pub enum PatternsCommands {
    /// List the active naming patterns
    List,

    /// Show the pattern that applies to a resource type and environment
    Show(ShowArgs),

    /// Check pattern documents for schema, template and duplicate errors
    Check(CheckArgs),

    /// Print the JSON schema pattern documents must follow
    Schema,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Resource type
    pub resource_type: String,

    /// Environment
    pub environment: String,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Files or directories to check (default: the project's patterns directory)
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Tabled)]
struct PatternRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RESOURCE TYPE")]
    resource_type: String,
    #[tabled(rename = "ENV")]
    environment: String,
    #[tabled(rename = "TEMPLATE")]
    template: String,
    #[tabled(rename = "SCOPE")]
    uniqueness_scope: String,
}

pub fn run(cmd: PatternsCommands, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    match cmd {
        PatternsCommands::List => run_list(global),
        PatternsCommands::Show(args) => run_show(args, global),
        PatternsCommands::Check(args) => run_check(args, global),
        PatternsCommands::Schema => run_schema(),
    }
}

fn run_list(global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let registry = session.snapshot()?;

    let format = effective_format(global.format, true);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        let defs: Vec<&NamingPattern> = registry.patterns().iter().map(|p| p.definition()).collect();
        print_structured(&defs, format)?;
        return Ok(Outcome::Success);
    }

    let rows: Vec<PatternRow> = registry
        .patterns()
        .iter()
        .map(|p| {
            let def = p.definition();
            PatternRow {
                id: def.id.clone(),
                resource_type: def.resource_type.clone(),
                environment: def.environment.clone(),
                template: truncate_str(&def.template, 60),
                uniqueness_scope: def.uniqueness_scope.clone(),
            }
        })
        .collect();

    if rows.is_empty() {
        println!("No naming patterns loaded.");
        return Ok(Outcome::Success);
    }

    print_rows(&rows, format)?;
    if format == OutputFormat::Table {
        println!("{} pattern(s)", style(rows.len()).cyan());
    }
    Ok(Outcome::Success)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let session = Session::open(global)?;
    let registry = session.snapshot()?;
    let pattern = registry.resolve(&args.resource_type, &args.environment)?;

    let format = effective_format(global.format, false);
    if print_structured(pattern.definition(), format)? {
        return Ok(Outcome::Success);
    }

    let def = pattern.definition();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Pattern").bold(), style(&def.id).cyan());
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Template").bold(), def.template);
    println!(
        "{}: {} / {}",
        style("Applies to").bold(),
        def.resource_type,
        def.environment
    );
    if let Some(prefix) = pattern.environment_prefix(&args.environment) {
        println!("{}: {}", style("Required prefix").bold(), prefix);
    }
    println!("{}: {}", style("Uniqueness").bold(), def.uniqueness_scope);
    println!(
        "{}: {}",
        style("Suffixes").bold(),
        if pattern.allows_suffix() { "allowed" } else { "not allowed" }
    );
    if let Some(description) = &def.description {
        println!("{}: {}", style("Description").bold(), description);
    }

    println!();
    println!("{}", style("Slots:").bold());
    for slot in pattern.slots() {
        let rule = def.slots.get(&slot);
        let constraint = rule
            .and_then(|r| r.pattern.clone())
            .unwrap_or_else(|| slot_constraint(pattern, slot, &args.environment));
        let default = pattern
            .default_for(slot, &args.environment)
            .map(|d| format!(" (default {})", d))
            .unwrap_or_default();
        println!("  {:<14} {}{}", slot.to_string(), constraint, style(default).dim());
    }

    Ok(Outcome::Success)
}

fn slot_constraint(pattern: &CompiledPattern, slot: SlotKind, environment: &str) -> String {
    match slot {
        SlotKind::Environment => pattern.environment_token(environment),
        SlotKind::ResourceType => pattern.resource_token(),
        other => other.default_constraint().to_string(),
    }
}

fn run_check(args: CheckArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let files = if args.paths.is_empty() {
        let session = Session::open(global)?;
        session.require_project()?;
        let dir = session
            .patterns_dir()
            .ok_or_else(|| CommandError::usage("no patterns directory configured"))?;
        expand_paths(&[dir])
    } else {
        expand_paths(&args.paths)
    };

    if files.is_empty() {
        println!("{} No pattern documents found", style("!").yellow());
        return Ok(Outcome::Success);
    }

    println!(
        "{} Checking {} pattern document(s)...\n",
        style("→").blue(),
        files.len()
    );

    let schemas = SchemaRegistry::default();
    let mut loaded = Vec::new();
    let mut failed = 0;

    for path in &files {
        match load_pattern_file(&schemas, path).and_then(|def| {
            CompiledPattern::compile(def.clone()).map(|_| def)
        }) {
            Ok(def) => {
                println!("{} {}", style("✓").green(), path.display());
                loaded.push(def);
            }
            Err(e) => {
                failed += 1;
                println!("{} {}", style("✗").red(), path.display());
                println!("    {}", e);
            }
        }
    }

    if failed == 0 {
        if let Err(e) = PatternRegistry::load(loaded) {
            failed += 1;
            println!("{} {}", style("✗").red(), e);
        }
    }

    println!();
    if failed == 0 {
        println!(
            "{} All pattern documents are valid",
            style("✓").green().bold()
        );
        Ok(Outcome::Success)
    } else {
        println!("{} {} problem(s) found", style("✗").red().bold(), failed);
        Ok(Outcome::Invalid)
    }
}

fn run_schema() -> Result<Outcome, CommandError> {
    let source = SchemaRegistry::pattern_schema_source()
        .ok_or_else(|| CommandError::usage("pattern schema is not embedded in this build"))?;
    println!("{}", source);
    Ok(Outcome::Success)
}

/// Expand paths - directories are walked for `*.yaml`/`*.yml`
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if is_yaml(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.exists() {
            files.push(path.clone());
        }
    }

    files.sort();
    files
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
