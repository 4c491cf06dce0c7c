//! `flotilla completions` command

use std::io;

use anyhow::Result;
use clap::CommandFactory;

use crate::cli::{Cli, CompletionsArgs};

/// Write the completion script for `args.shell` to stdout.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "flotilla", &mut io::stdout());
    Ok(())
}
