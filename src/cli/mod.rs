//! CLI module - argument parsing and command dispatch

pub mod args;
pub mod commands;
pub mod error;
pub mod helpers;
pub mod output;
pub mod session;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat};
pub use error::{CommandError, Outcome};
pub use session::Session;

/// Run a parsed command line
pub fn run(cli: Cli) -> Result<Outcome, CommandError> {
    let global = cli.global;
    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Validate(args) => commands::validate::run(args, &global),
        Commands::Generate(args) => commands::generate::run(args, &global),
        Commands::Patterns(cmd) => commands::patterns::run(cmd, &global),
        Commands::Change(cmd) => commands::change::run(cmd, &global),
        Commands::Exception(cmd) => commands::exception::run(cmd, &global),
        Commands::Claim(args) => commands::claim::run(args, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
