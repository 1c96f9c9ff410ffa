//! `ngt completions` command - generate shell completion scripts

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::error::{CommandError, Outcome};
use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<Outcome, CommandError> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut std::io::stdout());
    Ok(Outcome::Success)
}
