//! Terminal output of the flotilla commands.
//!
//! Every user-facing line goes through [`Shell`]: right-aligned status
//! words, diagnostics, the import progress bar, and in JSON mode one event
//! per line on stdout. Human output never goes to stdout, which is kept for
//! the reports commands print (build plans, `show`, `status`).

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::util::diagnostic::{Diagnostic, Severity};

/// Width of the status column.
const STATUS_WIDTH: usize = 12;

/// Human and JSON output are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Events on stdout, nothing for humans
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Status lines and the progress bar
    #[default]
    Normal,
    /// Status lines without the bar, so that debug logs stay readable
    Verbose,
}

/// When to use ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Only when stderr is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            other => Err(format!(
                "unknown color setting `{}`, use auto, always or never",
                other
            )),
        }
    }
}

/// The word printed in the status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Imported,
    Updated,
    Finished,
    Importing,
    Info,
    Excluded,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Imported => "Imported",
            Status::Updated => "Updated",
            Status::Finished => "Finished",
            Status::Importing => "Importing",
            Status::Info => "Info",
            Status::Excluded => "Excluded",
        }
    }

    fn color_code(self) -> &'static str {
        match self {
            Status::Imported | Status::Updated | Status::Finished => "\x1b[1;32m",
            Status::Importing => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Excluded => "\x1b[1;33m",
        }
    }
}

/// Output handle shared by a command and its progress displays.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };
        Shell { mode, use_color }
    }

    /// Create a shell from the global command-line flags.
    ///
    /// `--message-format json` wins over `--quiet` and `--verbose`.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        if json {
            return Shell::new(ShellMode::Json);
        }
        let verbosity = match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        };
        Shell::new(ShellMode::Human { verbosity, color })
    }

    fn verbosity(&self) -> Option<Verbosity> {
        match self.mode {
            ShellMode::Human { verbosity, .. } => Some(verbosity),
            ShellMode::Json => None,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity() == Some(Verbosity::Quiet)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity() == Some(Verbosity::Verbose)
    }

    pub fn is_json(&self) -> bool {
        self.mode == ShellMode::Json
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print `{status:>12} {message}` on stderr.
    ///
    /// Dropped in quiet and JSON mode.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() || self.is_quiet() {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Print a multi-line diagnostic.
    ///
    /// Warnings are dropped in quiet mode. In JSON mode the diagnostic is
    /// emitted as an event carrying its severity.
    pub fn diagnostic(&self, diag: &Diagnostic) {
        if self.is_json() {
            self.json_event(&serde_json::json!({
                "reason": diag.severity.to_string(),
                "message": diag.message,
                "context": diag.context,
            }));
            return;
        }
        if self.is_quiet() && diag.severity != Severity::Error {
            return;
        }
        eprint!("{}", diag.format(self.use_color));
    }

    /// Print one JSON event per line on stdout. Ignored outside JSON mode.
    pub fn json_event(&self, event: &serde_json::Value) {
        if !self.is_json() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", event);
        let _ = stdout.flush();
    }

    fn format_status(&self, status: Status) -> String {
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                status.label(),
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", status.label(), width = STATUS_WIDTH)
        }
    }

    /// Start a timed operation, see [`Span`].
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }

    /// Create a progress display. The total may grow later.
    pub fn progress(self: &Arc<Self>, total: u64, msg: impl Display) -> Progress {
        Progress::new(Arc::clone(self), total, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A timed operation.
///
/// The start line is only printed right away in verbose mode. Finishing
/// prints the elapsed time, dropping an unfinished span only does so when
/// the operation was slow enough to be noticed.
pub struct Span {
    shell: Arc<Shell>,
    start: Instant,
    started: bool,
    finished: bool,
}

impl Span {
    const NOTICEABLE: Duration = Duration::from_millis(200);

    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        let started = shell.is_verbose();
        if started {
            shell.status(status, &message);
        }
        Span {
            shell,
            start: Instant::now(),
            started,
            finished: false,
        }
    }

    pub fn finish_with_message(mut self, msg: impl Display) {
        self.finished = true;
        let elapsed = format_duration(self.start.elapsed());
        self.shell
            .status(Status::Finished, format!("{} in {}", msg, elapsed));
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if !self.finished && (self.started || elapsed > Self::NOTICEABLE) {
            self.shell
                .status(Status::Finished, format!("in {}", format_duration(elapsed)));
        }
    }
}

/// Progress of a run over a growing number of packages.
///
/// Shows an indicatif bar in normal mode. Quiet and verbose modes have no
/// bar, JSON mode emits `progress` events instead.
pub struct Progress {
    shell: Arc<Shell>,
    pb: Option<ProgressBar>,
    total: u64,
    current: u64,
    message: String,
}

impl Progress {
    fn new(shell: Arc<Shell>, total: u64, message: String) -> Self {
        let pb = match shell.verbosity() {
            Some(Verbosity::Normal) => {
                let pb = ProgressBar::new(total);
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-");
                pb.set_style(style);
                pb.set_message(message.clone());
                Some(pb)
            }
            _ => None,
        };

        Progress {
            shell,
            pb,
            total,
            current: 0,
            message,
        }
    }

    pub fn inc(&mut self, delta: u64) {
        self.current += delta;
        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }

        if self.shell.is_json() {
            self.shell.json_event(&serde_json::json!({
                "reason": "progress",
                "current": self.current,
                "total": self.total,
                "message": self.message,
            }));
        } else if self.shell.is_verbose() {
            eprintln!("  {} [{}/{}]", self.message, self.current, self.total);
        }
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        if let Some(pb) = &self.pb {
            pb.set_length(total);
        }
    }

    /// Change the message shown next to the bar.
    pub fn set_message(&mut self, msg: impl Display) {
        self.message = msg.to_string();
        if let Some(pb) = &self.pb {
            pb.set_message(self.message.clone());
        }
    }

    /// Print a status line without breaking the bar.
    pub fn status(&self, status: Status, msg: impl Display) {
        match &self.pb {
            Some(pb) => pb.suspend(|| self.shell.status(status, msg)),
            None => self.shell.status(status, msg),
        }
    }

    /// Print a diagnostic without breaking the bar.
    pub fn diagnostic(&self, diag: &Diagnostic) {
        match &self.pb {
            Some(pb) => pb.suspend(|| self.shell.diagnostic(diag)),
            None => self.shell.diagnostic(diag),
        }
    }

    /// Keep the status lines but drop the bar.
    pub fn without_bar(mut self) -> Self {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        self
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }

    pub fn position(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
