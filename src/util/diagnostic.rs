//! User-facing diagnostics.
//!
//! A diagnostic is what flotilla prints when something needs the user's
//! attention: a one-line message, the chain of facts that led to it, and
//! what to do about it.

use std::fmt;
use std::path::PathBuf;

/// Hints shared by several diagnostics.
pub mod suggestions {
    pub const NO_WORKSPACE: &str =
        "run flotilla from inside a workspace, or pass `--workspace <dir>`";

    pub const EXCLUDED: &str = "run `flotilla show <package>` to see why it is excluded";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn color_code(self) -> &'static str {
        match self {
            Severity::Error => "\x1b[1;31m",
            Severity::Warning => "\x1b[1;33m",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message with its context and suggested fixes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// One line per fact, printed in order
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
    /// Directory or file the diagnostic is about
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    fn new(severity: Severity, message: String) -> Self {
        Diagnostic {
            message,
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Error, message.into())
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Warning, message.into())
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Render for the terminal.
    ///
    /// ```text
    /// error: `gui` has no VCS, but is not checked out in /ws/gui
    ///   --> /ws/gui
    ///   → ...
    /// help: add a `vcs` entry for this package
    /// ```
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("{}{}\x1b[0m", code, text)
            } else {
                text.to_string()
            }
        };

        let mut out = format!(
            "{}: {}\n",
            paint(self.severity.color_code(), self.severity.as_str()),
            self.message
        );
        if let Some(path) = &self.location {
            out.push_str(&format!("  --> {}\n", path.display()));
        }
        for line in &self.context {
            out.push_str(&format!("  → {}\n", line));
        }
        for suggestion in &self.suggestions {
            out.push_str(&format!("{}: {}\n", paint("\x1b[1;32m", "help"), suggestion));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::warning("nothing selected by `perception` can be imported anymore")
            .with_context("camera: failed to import: repository not found")
            .with_location("/ws/src/camera")
            .with_suggestion(suggestions::EXCLUDED);

        assert_eq!(
            diag.format(false),
            "warning: nothing selected by `perception` can be imported anymore\n\
             \x20 --> /ws/src/camera\n\
             \x20 → camera: failed to import: repository not found\n\
             help: run `flotilla show <package>` to see why it is excluded\n"
        );
    }

    #[test]
    fn test_colored_severity() {
        let output = Diagnostic::error("boom").format(true);
        assert!(output.starts_with("\x1b[1;31merror\x1b[0m: boom\n"));
    }

    #[test]
    fn test_plain_warning() {
        let output = Diagnostic::warning("lidar is excluded").format(false);
        assert_eq!(output, "warning: lidar is excluded\n");
    }
}
