//! Git importer - packages checked out from git repositories.

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Oid, Repository, StatusOptions};

use crate::core::package::{PackageRecord, VcsDefinition, VcsKind};
use crate::sources::importer::{ImportError, Importer, VcsStatus};

const FETCH_REFSPECS: [&str; 2] = ["+refs/heads/*:refs/remotes/origin/*", "+refs/tags/*:refs/tags/*"];

/// Imports a package from a git remote.
///
/// Without a pinned commit or tag, the checkout follows a branch (the
/// configured one, or whatever is checked out) and is only ever
/// fast-forwarded.
#[derive(Debug, Clone)]
pub struct GitImporter {
    url: String,
    branch: Option<String>,
    tag: Option<String>,
    commit: Option<String>,
}

impl GitImporter {
    /// Create an importer from a `type = "git"` definition.
    pub fn from_definition(vcs: &VcsDefinition) -> Result<Self, ImportError> {
        let url = vcs
            .url
            .clone()
            .ok_or(ImportError::MissingUrl { kind: VcsKind::Git })?;

        Ok(GitImporter {
            url,
            branch: vcs.branch.clone(),
            tag: vcs.tag.clone(),
            commit: vcs.commit.clone(),
        })
    }

    /// Create an importer following the `origin` remote of an existing checkout.
    ///
    /// Returns `None` when `dir` is not a git checkout or has no `origin`.
    pub fn from_checkout(dir: &Path) -> Result<Option<Self>, ImportError> {
        if !dir.join(".git").exists() {
            return Ok(None);
        }
        let repo = Repository::open(dir)?;
        let Ok(remote) = repo.find_remote("origin") else {
            return Ok(None);
        };
        let Some(url) = remote.url() else {
            return Ok(None);
        };

        Ok(Some(GitImporter {
            url: url.to_string(),
            branch: None,
            tag: None,
            commit: None,
        }))
    }

    /// Revision spec of the pinned state, commit first.
    fn pinned_spec(&self) -> Option<String> {
        self.commit
            .clone()
            .or_else(|| self.tag.as_ref().map(|tag| format!("refs/tags/{}", tag)))
    }

    fn clone_into(&self, dir: &Path) -> Result<(), ImportError> {
        if dir.exists() && dir.read_dir()?.next().is_some() {
            return Err(ImportError::Failed(format!(
                "{} exists and is not a git checkout",
                dir.display()
            )));
        }

        tracing::info!("cloning {} into {}", self.url, dir.display());
        let mut builder = RepoBuilder::new();
        if let Some(branch) = &self.branch {
            builder.branch(branch);
        }
        let repo = builder.clone(&self.url, dir)?;

        if self.pinned_spec().is_some() {
            self.checkout_pinned(&repo)?;
        }
        Ok(())
    }

    fn fetch(&self, repo: &Repository) -> Result<(), ImportError> {
        tracing::debug!("fetching {}", self.url);
        let mut remote = repo.find_remote("origin")?;
        remote.fetch(&FETCH_REFSPECS, None, None)?;
        Ok(())
    }

    fn checkout_pinned(&self, repo: &Repository) -> Result<(), ImportError> {
        let Some(target) = self.tracked_commit(repo)? else {
            return Ok(());
        };
        let commit = repo.find_commit(target)?;
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
        repo.set_head_detached(target)?;
        Ok(())
    }

    /// Branch followed by the checkout, `None` on a detached HEAD.
    fn tracked_branch(&self, repo: &Repository) -> Result<Option<String>, ImportError> {
        if let Some(branch) = &self.branch {
            return Ok(Some(branch.clone()));
        }
        if repo.head_detached()? {
            return Ok(None);
        }
        Ok(repo.head()?.shorthand().map(str::to_string))
    }

    /// Commit the checkout should be at.
    fn tracked_commit(&self, repo: &Repository) -> Result<Option<Oid>, ImportError> {
        if let Some(spec) = self.pinned_spec() {
            let commit = repo.revparse_single(&spec)?.peel_to_commit()?;
            return Ok(Some(commit.id()));
        }

        let Some(branch) = self.tracked_branch(repo)? else {
            return Ok(None);
        };
        Ok(repo
            .refname_to_id(&format!("refs/remotes/origin/{}", branch))
            .ok())
    }

    fn fast_forward(&self, repo: &Repository) -> Result<(), ImportError> {
        let Some(branch) = self.tracked_branch(repo)? else {
            tracing::warn!("{} has a detached HEAD, not updating", self.url);
            return Ok(());
        };
        let Some(remote) = self.tracked_commit(repo)? else {
            return Err(ImportError::Failed(format!(
                "branch {} does not exist in {}",
                branch, self.url
            )));
        };

        let local = repo.head()?.peel_to_commit()?.id();
        if local == remote || repo.graph_descendant_of(local, remote)? {
            return Ok(());
        }
        if !repo.graph_descendant_of(remote, local)? {
            return Err(ImportError::Failed(format!(
                "local branch {0} and origin/{0} have diverged, merge them manually",
                branch
            )));
        }

        let target = repo.find_commit(remote)?;
        repo.checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;

        let refname = format!("refs/heads/{}", branch);
        match repo.find_reference(&refname) {
            Ok(mut reference) => {
                reference.set_target(remote, "flotilla: fast-forward")?;
            }
            Err(_) => {
                repo.reference(&refname, remote, true, "flotilla: track remote branch")?;
            }
        }
        repo.set_head(&refname)?;

        tracing::info!("fast-forwarded {} to {}", branch, short_id(remote));
        Ok(())
    }
}

impl Importer for GitImporter {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn import(&self, pkg: &PackageRecord, only_local: bool) -> Result<(), ImportError> {
        let dir = pkg.srcdir();
        if !dir.join(".git").exists() {
            return self.clone_into(dir);
        }
        if only_local {
            tracing::debug!("{}: not updating in local mode", pkg.name());
            return Ok(());
        }

        let repo = Repository::open(dir)?;
        self.fetch(&repo)?;
        if self.pinned_spec().is_some() {
            self.checkout_pinned(&repo)
        } else {
            self.fast_forward(&repo)
        }
    }

    fn supports_status(&self) -> bool {
        true
    }

    fn status(&self, pkg: &PackageRecord, only_local: bool) -> Result<VcsStatus, ImportError> {
        let repo = Repository::open(pkg.srcdir())?;
        if !only_local {
            self.fetch(&repo)?;
        }

        let uncommitted = has_uncommitted_changes(&repo)?;
        let Some(tracked) = self.tracked_commit(&repo)? else {
            return Ok(VcsStatus::from_commits(uncommitted, Vec::new(), Vec::new()));
        };

        let local = repo.head()?.peel_to_commit()?.id();
        let local_commits = commit_lines(&repo, local, tracked)?;
        let remote_commits = commit_lines(&repo, tracked, local)?;
        Ok(VcsStatus::from_commits(
            uncommitted,
            local_commits,
            remote_commits,
        ))
    }
}

fn has_uncommitted_changes(repo: &Repository) -> Result<bool, ImportError> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .any(|entry| entry.status() != git2::Status::CURRENT))
}

/// `<short id> <summary>` for each commit reachable from `from` but not from `hide`.
fn commit_lines(repo: &Repository, from: Oid, hide: Oid) -> Result<Vec<String>, ImportError> {
    let mut walk = repo.revwalk()?;
    walk.push(from)?;
    walk.hide(hide)?;

    let mut lines = Vec::new();
    for oid in walk {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        lines.push(format!(
            "{} {}",
            short_id(oid),
            commit.summary().unwrap_or_default()
        ));
    }
    Ok(lines)
}

fn short_id(oid: Oid) -> String {
    oid.to_string()[..8].to_string()
}
