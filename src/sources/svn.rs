//! Subversion importer, driving the `svn` executable.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::core::package::{PackageRecord, VcsDefinition, VcsKind};
use crate::sources::importer::{ImportError, Importer, VcsStatus};
use crate::util::process::{exec_stdout, find_executable, ProcessBuilder};

/// Imports a package from a Subversion repository.
#[derive(Debug, Clone)]
pub struct SvnImporter {
    url: String,
    /// Pinned revision
    revision: Option<String>,
}

impl SvnImporter {
    /// Create an importer from a `type = "svn"` definition.
    ///
    /// The `commit` field holds the pinned revision.
    pub fn from_definition(vcs: &VcsDefinition) -> Result<Self, ImportError> {
        let url = vcs
            .url
            .clone()
            .ok_or(ImportError::MissingUrl { kind: VcsKind::Svn })?;

        Ok(SvnImporter {
            url,
            revision: vcs.commit.clone(),
        })
    }

    fn svn() -> Result<PathBuf, ImportError> {
        find_executable("svn")
            .ok_or_else(|| ImportError::Failed("`svn` was not found in PATH".to_string()))
    }

    fn base_command(program: PathBuf) -> ProcessBuilder {
        ProcessBuilder::new(program)
            .env("LC_ALL", "C")
            .arg("--non-interactive")
    }

    fn checkout_command(&self, program: PathBuf, dir: &Path) -> ProcessBuilder {
        let mut cmd = Self::base_command(program).arg("checkout");
        if let Some(rev) = &self.revision {
            cmd = cmd.args(["-r", rev.as_str()]);
        }
        cmd.arg(&self.url).arg(dir)
    }

    fn update_command(&self, program: PathBuf, dir: &Path) -> ProcessBuilder {
        let mut cmd = Self::base_command(program).arg("update");
        if let Some(rev) = &self.revision {
            cmd = cmd.args(["-r", rev.as_str()]);
        }
        cmd.cwd(dir)
    }
}

impl Importer for SvnImporter {
    fn kind(&self) -> VcsKind {
        VcsKind::Svn
    }

    fn import(&self, pkg: &PackageRecord, only_local: bool) -> Result<(), ImportError> {
        let dir = pkg.srcdir();
        if !dir.join(".svn").is_dir() {
            tracing::info!("checking out {} into {}", self.url, dir.display());
            let cmd = self.checkout_command(Self::svn()?, dir);
            cmd.exec_and_check()
                .with_context(|| format!("svn checkout of {} failed", self.url))?;
            return Ok(());
        }
        if only_local {
            return Ok(());
        }

        let cmd = self.update_command(Self::svn()?, dir);
        cmd.exec_and_check()
            .with_context(|| format!("svn update in {} failed", dir.display()))?;
        Ok(())
    }

    fn supports_status(&self) -> bool {
        true
    }

    fn status(&self, pkg: &PackageRecord, only_local: bool) -> Result<VcsStatus, ImportError> {
        let program = Self::svn()?;
        let dir = pkg.srcdir();

        let local = exec_stdout(
            &Self::base_command(program.clone())
                .args(["status", "-q"])
                .cwd(dir),
        )?;
        let uncommitted = !local.trim().is_empty();

        let mut remote_commits = Vec::new();
        if !only_local && self.revision.is_none() {
            let remote = exec_stdout(
                &Self::base_command(program)
                    .args(["status", "-u", "-q"])
                    .cwd(dir),
            )?;
            remote_commits = parse_out_of_date(&remote);
        }

        Ok(VcsStatus::from_commits(uncommitted, Vec::new(), remote_commits))
    }
}

/// Paths `svn status -u` marks as out of date (`*` in column 9).
fn parse_out_of_date(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.len() > 9 && line.as_bytes()[8] == b'*')
        .filter_map(|line| line.split_whitespace().last())
        .map(|path| format!("{} changed remotely", path))
        .collect()
}
