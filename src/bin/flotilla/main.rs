//! flotilla CLI - selection and import engine for multi-repository workspaces

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flotilla::core::errors::FlotillaError;
use flotilla::util::diagnostic;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging, RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.global.verbose {
            EnvFilter::new("flotilla=debug")
        } else {
            EnvFilter::new("flotilla=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &cli.global).map(|_| 0),
        Commands::Update(args) => commands::update::execute(args, &cli.global).map(|_| 0),
        Commands::Show(args) => commands::show::execute(args, &cli.global).map(|_| 0),
        Commands::Status(args) => commands::status::execute(args, &cli.global),
        Commands::Completions(args) => commands::completions::execute(args).map(|_| 0),
    }
}

/// Print a failed command's error.
///
/// Configuration errors get the full diagnostic, cancellation a single line.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<FlotillaError>() {
        Some(e) if e.is_cancelled() => eprintln!("{}", e),
        Some(e) => diagnostic::emit(&e.to_diagnostic(), std::io::stderr().is_terminal()),
        None => eprintln!("error: {:#}", err),
    }
}
