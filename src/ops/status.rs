//! Implementation of `flotilla status`.
//!
//! Compares every selected checkout with its remote. Packages that are in
//! sync are batched into a single line, the others get one block each.

use std::ops::BitOr;

use crate::core::package::PackageRecord;
use crate::core::workspace::Workspace;
use crate::sources::{Importer, SyncState};

const BATCH_WIDTH: usize = 80;

/// Summary of a status run, turned into the exit code of `--exit-code`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusResult {
    pub uncommitted: bool,
    pub local: bool,
    pub remote: bool,
}

impl StatusResult {
    /// Bit 0: uncommitted changes, bit 1: local commits, bit 2: remote commits.
    pub fn exit_code(&self) -> i32 {
        let mut code = 0;
        if self.uncommitted {
            code |= 1;
        }
        if self.local {
            code |= 2;
        }
        if self.remote {
            code |= 4;
        }
        code
    }
}

impl BitOr for StatusResult {
    type Output = StatusResult;

    fn bitor(self, rhs: StatusResult) -> StatusResult {
        StatusResult {
            uncommitted: self.uncommitted || rhs.uncommitted,
            local: self.local || rhs.local,
            remote: self.remote || rhs.remote,
        }
    }
}

/// Kind of a report line, used for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Plain,
    InSync,
    Problem,
    Local,
    Remote,
}

impl LineKind {
    fn color_code(&self) -> Option<&'static str> {
        match self {
            LineKind::Plain => None,
            LineKind::InSync => Some("\x1b[32m"),
            LineKind::Problem => Some("\x1b[1;31m"),
            LineKind::Local => Some("\x1b[34m"),
            LineKind::Remote => Some("\x1b[35m"),
        }
    }
}

/// One line of a status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub kind: LineKind,
    pub text: String,
}

impl ReportLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        ReportLine {
            kind,
            text: text.into(),
        }
    }
}

/// Status of a set of packages, ready to print.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    lines: Vec<ReportLine>,
    result: StatusResult,
    in_sync: Vec<String>,
}

impl StatusReport {
    pub fn new() -> Self {
        StatusReport::default()
    }

    pub fn result(&self) -> StatusResult {
        self.result
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Add the status of one package.
    pub fn add(&mut self, pkg: &PackageRecord, only_local: bool) {
        let details = self.package_lines(pkg, only_local);

        let sync_msg = self.in_sync.join(", ");
        if !details.is_empty() && !self.in_sync.is_empty() {
            self.flush_in_sync();
        } else if self.in_sync.len() > 1 && sync_msg.len() > BATCH_WIDTH {
            let last = self.in_sync.pop().unwrap_or_default();
            let batch = std::mem::replace(&mut self.in_sync, vec![last]);
            self.lines
                .push(ReportLine::new(LineKind::Plain, format!("{},", batch.join(", "))));
        }

        match details.len() {
            0 => {}
            1 => {
                let line = &details[0];
                self.lines.push(ReportLine::new(
                    line.kind,
                    format!("{}: {}", pkg.name(), line.text.trim_start()),
                ));
            }
            _ => {
                self.lines
                    .push(ReportLine::new(LineKind::Plain, format!("{}:", pkg.name())));
                self.lines.extend(details);
            }
        }
    }

    /// Flush pending in-sync packages and return the finished report.
    pub fn finish(mut self) -> Self {
        self.flush_in_sync();
        self
    }

    /// Render the report, one package block after the other.
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match (color, line.kind.color_code()) {
                (true, Some(code)) => out.push_str(&format!("{}{}\x1b[0m\n", code, line.text)),
                _ => out.push_str(&format!("{}\n", line.text)),
            }
        }
        out
    }

    fn flush_in_sync(&mut self) {
        if self.in_sync.is_empty() {
            return;
        }
        let names = std::mem::take(&mut self.in_sync).join(", ");
        self.lines.push(ReportLine::new(
            LineKind::InSync,
            format!("{}: local and remote are in sync", names),
        ));
    }

    fn package_lines(&mut self, pkg: &PackageRecord, only_local: bool) -> Vec<ReportLine> {
        let Some(importer) = pkg.importer() else {
            return vec![ReportLine::new(
                LineKind::Problem,
                "  is a local-only package (no VCS)",
            )];
        };
        self.importer_lines(pkg, importer.as_ref(), only_local)
    }

    fn importer_lines(
        &mut self,
        pkg: &PackageRecord,
        importer: &dyn Importer,
        only_local: bool,
    ) -> Vec<ReportLine> {
        if !importer.supports_status() {
            return vec![ReportLine::new(
                LineKind::Problem,
                format!(
                    "  the {} importer does not support status display",
                    importer.kind()
                ),
            )];
        }
        if !pkg.is_checked_out() {
            return vec![ReportLine::new(LineKind::Remote, "  is not imported yet")];
        }

        let status = match importer.status(pkg, only_local) {
            Ok(status) => status,
            Err(err) => {
                tracing::debug!("status of {} failed: {}", pkg.name(), err);
                return vec![ReportLine::new(
                    LineKind::Problem,
                    "  failed to fetch status information",
                )];
            }
        };

        let mut lines = Vec::new();
        if status.uncommitted_changes {
            lines.push(ReportLine::new(
                LineKind::Problem,
                "  contains uncommitted modifications",
            ));
            self.result.uncommitted = true;
        }

        let commits = |kind, list: &[String], indent: &str| {
            list.iter()
                .map(move |c| ReportLine::new(kind, format!("{}{}", indent, c)))
                .collect::<Vec<_>>()
        };

        match status.state {
            SyncState::UpToDate => {
                if lines.is_empty() {
                    self.in_sync.push(pkg.name().to_string());
                }
            }
            SyncState::LocalAhead => {
                self.result.local = true;
                lines.push(ReportLine::new(
                    LineKind::Local,
                    format!(
                        "  local contains {} that remote does not have:",
                        commit_count(status.local_commits.len())
                    ),
                ));
                lines.extend(commits(LineKind::Local, &status.local_commits, "    "));
            }
            SyncState::RemoteAhead => {
                self.result.remote = true;
                lines.push(ReportLine::new(
                    LineKind::Remote,
                    format!(
                        "  remote contains {} that local does not have:",
                        commit_count(status.remote_commits.len())
                    ),
                ));
                lines.extend(commits(LineKind::Remote, &status.remote_commits, "    "));
            }
            SyncState::Diverged => {
                self.result.local = true;
                self.result.remote = true;
                lines.push(ReportLine::new(
                    LineKind::Plain,
                    format!(
                        "  local and remote have diverged with respectively {} and {} commits each",
                        status.local_commits.len(),
                        status.remote_commits.len()
                    ),
                ));
                lines.push(ReportLine::new(LineKind::Local, "  -- local commits --"));
                lines.extend(commits(LineKind::Local, &status.local_commits, "   "));
                lines.push(ReportLine::new(LineKind::Remote, "  -- remote commits --"));
                lines.extend(commits(LineKind::Remote, &status.remote_commits, "   "));
            }
        }
        lines
    }
}

fn commit_count(n: usize) -> String {
    if n == 1 {
        "1 commit".to_string()
    } else {
        format!("{} commits", n)
    }
}

/// Collect the status of `names`, in the given order.
///
/// Names that are not registered are skipped.
pub fn collect_status<'a, I>(ws: &Workspace, names: I, only_local: bool) -> StatusReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = StatusReport::new();
    for name in names {
        match ws.registry().find(name) {
            Some(pkg) => report.add(pkg, only_local),
            None => tracing::debug!("no status for unknown package {}", name),
        }
    }
    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::VcsStatus;
    use crate::test_support::{MockImporter, WorkspaceBuilder};
    use tempfile::TempDir;

    fn commits(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("abc{:04} change {}", i, i)).collect()
    }

    fn checked_out(root: &std::path::Path, names: &[&str]) {
        for name in names {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    #[test]
    fn test_exit_code_bits() {
        let result = StatusResult {
            uncommitted: true,
            local: false,
            remote: true,
        };
        assert_eq!(result.exit_code(), 5);

        let diverged = StatusResult {
            local: true,
            remote: true,
            ..Default::default()
        };
        assert_eq!(diverged.exit_code(), 6);
        assert_eq!((result | diverged).exit_code(), 7);
        assert_eq!(StatusResult::default().exit_code(), 0);
    }

    #[test]
    fn test_uncommitted_and_remote_ahead_gives_five() {
        let tmp = TempDir::new().unwrap();
        checked_out(tmp.path(), &["base", "app"]);
        let importer = MockImporter::new()
            .with_status("base", VcsStatus::from_commits(true, vec![], vec![]))
            .with_status("app", VcsStatus::from_commits(false, vec![], commits(2)));
        let ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("base", &[])
            .package("app", &[])
            .build();

        let report = collect_status(&ws, ["app", "base"], false);

        assert_eq!(report.result().exit_code(), 5);
        let output = report.render(false);
        assert!(output.contains("app:\n  remote contains 2 commits that local does not have:\n"));
        assert!(output.contains("base: contains uncommitted modifications\n"));
    }

    #[test]
    fn test_package_without_status() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_status_failure("net", "timeout");
        checked_out(tmp.path(), &["net"]);
        let ws = WorkspaceBuilder::new(tmp.path(), importer)
            .local_package("local", &[])
            .package("missing", &[])
            .package("net", &[])
            .build();

        let output = collect_status(&ws, ["local", "missing", "net"], true).render(false);

        assert_eq!(
            output,
            "local: is a local-only package (no VCS)\n\
             missing: is not imported yet\n\
             net: failed to fetch status information\n"
        );
    }

    #[test]
    fn test_diverged() {
        let tmp = TempDir::new().unwrap();
        checked_out(tmp.path(), &["base"]);
        let importer = MockImporter::new()
            .with_status("base", VcsStatus::from_commits(false, commits(1), commits(2)));
        let ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("base", &[])
            .build();

        let report = collect_status(&ws, ["base"], false);
        let output = report.render(false);

        assert!(output.starts_with(
            "base:\n  local and remote have diverged with respectively 1 and 2 commits each\n"
        ));
        assert!(output.contains("  -- remote commits --\n   abc0000 change 0\n   abc0001 change 1\n"));
        assert_eq!(report.result().exit_code(), 6);
    }

    #[test]
    fn test_in_sync_packages_are_batched() {
        let tmp = TempDir::new().unwrap();
        let names: Vec<String> = (0..12).map(|i| format!("package-{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        checked_out(tmp.path(), &refs);
        let mut builder = WorkspaceBuilder::new(tmp.path(), MockImporter::new());
        for name in &refs {
            builder = builder.package(name, &[]);
        }
        let ws = builder.build();

        let report = collect_status(&ws, refs.iter().copied(), true);
        let lines = report.lines();

        assert!(lines.len() > 1);
        for line in &lines[..lines.len() - 1] {
            assert!(line.text.ends_with(','));
            assert!(line.text.len() <= BATCH_WIDTH + "package-00, ".len());
        }
        let last = &lines[lines.len() - 1];
        assert!(last.text.ends_with("package-11: local and remote are in sync"));
        assert_eq!(report.result().exit_code(), 0);
    }

    #[test]
    fn test_in_sync_batch_flushed_before_problem() {
        let tmp = TempDir::new().unwrap();
        checked_out(tmp.path(), &["a", "b", "c"]);
        let importer = MockImporter::new()
            .with_status("c", VcsStatus::from_commits(false, commits(1), vec![]));
        let ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("a", &[])
            .package("b", &[])
            .package("c", &[])
            .build();

        let output = collect_status(&ws, ["a", "b", "c"], true).render(false);

        assert_eq!(
            output,
            "a, b: local and remote are in sync\n\
             c:\n  local contains 1 commit that remote does not have:\n    abc0000 change 0\n"
        );
    }
}
