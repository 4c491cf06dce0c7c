//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use flotilla::util::ColorChoice;

/// flotilla - select, import and build packages of a multi-repository workspace
#[derive(Parser)]
#[command(name = "flotilla")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Directory of the workspace (defaults to searching upward for flotilla.toml)
    #[arg(long, global = true, value_name = "DIR", env = "FLOTILLA_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import the selected packages and their dependencies, then build them
    Build(BuildArgs),

    /// Update the workspace configuration and the selected packages
    Update(UpdateArgs),

    /// Show what the workspace knows about packages
    Show(ShowArgs),

    /// Display the VCS state of the selected packages
    Status(StatusArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Packages, package sets, metapackages or directories to build
    pub selectors: Vec<String>,

    /// Build the dependencies of the selection (default)
    #[arg(long, overrides_with = "no_deps")]
    pub deps: bool,

    /// Only build the selected packages
    #[arg(long)]
    pub no_deps: bool,

    /// Force a build of the selection even if nothing changed
    #[arg(long, conflicts_with = "rebuild")]
    pub force: bool,

    /// Clean and rebuild the selection
    #[arg(long)]
    pub rebuild: bool,

    /// Apply --force and --rebuild to the dependencies of the selection as well
    #[arg(long)]
    pub with_depends: bool,

    /// Install operating system dependencies (not supported)
    #[arg(long)]
    pub osdeps: bool,
}

impl BuildArgs {
    /// `--deps`/`--no-deps`, `None` when neither was given.
    pub fn deps(&self) -> Option<bool> {
        deps_flag(self.deps, self.no_deps)
    }
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Packages, package sets, metapackages or directories to update
    pub selectors: Vec<String>,

    /// Update the dependencies of the selection as well (default)
    #[arg(long, overrides_with = "no_deps")]
    pub deps: bool,

    /// Only update the selected packages
    #[arg(long)]
    pub no_deps: bool,

    /// Only check out missing packages, leave existing checkouts alone
    #[arg(long)]
    pub checkout: bool,

    /// Do not access the network for existing checkouts
    #[arg(long)]
    pub local: bool,

    /// Update the workspace configuration (default when no selectors are given)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub config: Option<bool>,

    /// Install operating system dependencies (not supported)
    #[arg(long)]
    pub osdeps: bool,
}

impl UpdateArgs {
    /// `--deps`/`--no-deps`, `None` when neither was given.
    pub fn deps(&self) -> Option<bool> {
        deps_flag(self.deps, self.no_deps)
    }
}

#[derive(Args)]
pub struct ShowArgs {
    /// Packages, package sets, metapackages or directories to show (defaults to the layout)
    pub selectors: Vec<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Packages, package sets, metapackages or directories to inspect
    pub selectors: Vec<String>,

    /// Only compare against the state last fetched, without network access
    #[arg(long)]
    pub local: bool,

    /// Exit with a code describing the state (1: uncommitted, 2: local ahead, 4: remote ahead)
    #[arg(long)]
    pub exit_code: bool,

    /// Display the status of the workspace configuration (default when no selectors are given)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub config: Option<bool>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

fn deps_flag(deps: bool, no_deps: bool) -> Option<bool> {
    match (deps, no_deps) {
        (_, true) => Some(false),
        (true, false) => Some(true),
        (false, false) => None,
    }
}
