//! `ngt init` command - create the project layout

use console::style;
use std::path::PathBuf;

use crate::cli::error::{CommandError, Outcome};
use crate::cli::GlobalOpts;
use crate::core::{Config, Project};
use crate::schema::SchemaRegistry;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Reinitialize an existing project; existing files are overwritten
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<Outcome, CommandError> {
    let root = match args.path.or_else(|| global.project.clone()) {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&root)?;

    let project = Project::init(&root, args.force)?;

    let config_path = project.config_path();
    if args.force || !config_path.exists() {
        std::fs::write(&config_path, Config::project_template())?;
    }

    let config = Config::load(Some(project.root()))?;
    let patterns_dir = project.patterns_dir(&config);
    std::fs::create_dir_all(&patterns_dir)?;

    let mut seeded = 0;
    for (filename, content) in SchemaRegistry::builtin_pattern_documents() {
        let target = patterns_dir.join(&filename);
        if args.force || !target.exists() {
            std::fs::write(&target, content)?;
            seeded += 1;
        }
    }

    tracing::info!(root = %project.root().display(), seeded, "project initialized");

    println!(
        "{} Initialized ngt project in {}",
        style("✓").green(),
        style(project.root().display()).cyan()
    );
    println!(
        "   {} pattern document(s) seeded in {}",
        seeded,
        style(patterns_dir.display()).dim()
    );
    println!(
        "   Add teams to {} to enable team checks",
        style(project.teams_path().display()).dim()
    );

    Ok(Outcome::Success)
}
