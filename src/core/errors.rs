//! Configuration errors and cancellation.
//!
//! Import failures are not errors at this level: they become exclusions
//! (see [`crate::resolver::exclusion`]). Everything here terminates the
//! current command.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Fatal errors of a flotilla run.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum FlotillaError {
    #[error("wrong package selection, cannot find a match for {}", .selectors.join(", "))]
    #[diagnostic(
        code(flotilla::selection::no_match),
        help("Run `flotilla show` to list the packages defined in this workspace")
    )]
    SelectionMismatch { selectors: Vec<String> },

    #[error("selected package `{name}` does not exist")]
    #[diagnostic(code(flotilla::selection::unknown_package))]
    UnknownPackage { name: String },

    #[error("no packages match {}", .selectors.join(" "))]
    #[diagnostic(code(flotilla::show::no_match))]
    NothingToShow { selectors: Vec<String> },

    #[error("`{name}` has no VCS, but is not checked out in {}", .srcdir.display())]
    #[diagnostic(
        code(flotilla::import::not_checked_out),
        help("Add a `vcs` entry for this package or check it out manually")
    )]
    NotCheckedOut { name: String, srcdir: PathBuf },

    #[error("this workspace requires flotilla {required}, but this is flotilla {current}")]
    #[diagnostic(code(flotilla::config::version_mismatch))]
    VersionMismatch { required: String, current: String },

    #[error("no {file} found in {} or any parent directory", .dir.display())]
    #[diagnostic(code(flotilla::config::not_found))]
    WorkspaceNotFound { dir: PathBuf, file: String },

    #[error("invalid workspace configuration: {message}")]
    #[diagnostic(code(flotilla::config::invalid))]
    Config { message: String },

    #[error("dependency cycle among enabled packages involving `{package}`")]
    #[diagnostic(
        code(flotilla::build::cycle),
        help("Break the cycle by turning one of the dependencies into an optional one")
    )]
    DependencyCycle { package: String },

    #[error("cancelled by user")]
    Cancelled,
}

impl FlotillaError {
    /// Check if this is an interactive cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlotillaError::Cancelled)
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string());

        match self {
            FlotillaError::NotCheckedOut { srcdir, .. } => {
                diag = diag.with_location(srcdir.clone());
            }
            FlotillaError::WorkspaceNotFound { .. } => {
                diag = diag.with_suggestion(suggestions::NO_WORKSPACE);
            }
            FlotillaError::SelectionMismatch { selectors } => {
                for selector in selectors {
                    diag = diag.with_context(format!(
                        "`{}` is neither a package, a package set, a metapackage nor a package directory",
                        selector
                    ));
                }
            }
            _ => {}
        }

        if let Some(help) = MietteDiagnostic::help(self) {
            diag = diag.with_suggestion(help.to_string());
        }
        diag
    }
}
