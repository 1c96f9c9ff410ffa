//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    change::ChangeCommands, claim::ClaimArgs, completions::CompletionsArgs,
    exception::ExceptionCommands, generate::GenerateArgs, init::InitArgs,
    patterns::PatternsCommands, validate::ValidateArgs,
};

#[derive(Parser, Debug)]
#[command(name = "ngt")]
#[command(author, version, about = "Naming Governance Toolkit - validate, generate and govern resource names")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "auto")]
    pub format: OutputFormat,

    /// Project root (default: discover from the current directory)
    #[arg(long, short = 'C', global = true, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Enable debug logging (otherwise controlled by NGT_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Text for single items, a table for lists
    Auto,
    Text,
    Json,
    Yaml,
    Table,
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize an ngt project in the current directory
    Init(InitArgs),

    /// Validate a resource name
    Validate(ValidateArgs),

    /// Generate a compliant resource name
    Generate(GenerateArgs),

    /// Inspect and check naming patterns
    #[command(subcommand)]
    Patterns(PatternsCommands),

    /// Manage change requests
    #[command(subcommand)]
    Change(ChangeCommands),

    /// Manage exception requests
    #[command(subcommand)]
    Exception(ExceptionCommands),

    /// Claim a name for an owner in the name index
    Claim(ClaimArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}
