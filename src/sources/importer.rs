//! Importer trait - the capability every VCS backend exposes.

use std::fmt;

use thiserror::Error;

use crate::core::package::{PackageRecord, VcsKind};

/// Failure to import or query a single package.
///
/// These never abort a run: the import engine turns them into exclusions.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Failed(String),

    #[error("{kind} source has no url")]
    MissingUrl { kind: VcsKind },

    #[error("{kind} importer does not support {operation}")]
    Unsupported {
        kind: VcsKind,
        operation: &'static str,
    },

    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("failed to download {url}: {message}")]
    Network { url: String, message: String },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How a checkout relates to the state it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    UpToDate,
    LocalAhead,
    RemoteAhead,
    Diverged,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::UpToDate => write!(f, "up to date"),
            SyncState::LocalAhead => write!(f, "local contains commits not in remote"),
            SyncState::RemoteAhead => write!(f, "remote contains commits not in local"),
            SyncState::Diverged => write!(f, "local and remote have diverged"),
        }
    }
}

/// Result of a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsStatus {
    pub state: SyncState,
    pub uncommitted_changes: bool,
    /// One line per commit only present locally
    pub local_commits: Vec<String>,
    /// One line per commit only present remotely
    pub remote_commits: Vec<String>,
}

impl VcsStatus {
    /// A clean checkout in sync with what it tracks.
    pub fn up_to_date() -> Self {
        VcsStatus {
            state: SyncState::UpToDate,
            uncommitted_changes: false,
            local_commits: Vec::new(),
            remote_commits: Vec::new(),
        }
    }

    /// Derive the state from the commit lists.
    pub fn from_commits(
        uncommitted_changes: bool,
        local_commits: Vec<String>,
        remote_commits: Vec<String>,
    ) -> Self {
        let state = match (local_commits.is_empty(), remote_commits.is_empty()) {
            (true, true) => SyncState::UpToDate,
            (false, true) => SyncState::LocalAhead,
            (true, false) => SyncState::RemoteAhead,
            (false, false) => SyncState::Diverged,
        };
        VcsStatus {
            state,
            uncommitted_changes,
            local_commits,
            remote_commits,
        }
    }

    /// Check if nothing needs the user's attention.
    pub fn is_in_sync(&self) -> bool {
        self.state == SyncState::UpToDate && !self.uncommitted_changes
    }
}

/// Fetches and updates the sources of a package.
pub trait Importer: fmt::Debug + Send + Sync {
    /// The VCS kind this importer handles.
    fn kind(&self) -> VcsKind;

    /// Check out `pkg` if missing, or update it.
    ///
    /// With `only_local`, no network access is made; an existing checkout
    /// is left as is.
    fn import(&self, pkg: &PackageRecord, only_local: bool) -> Result<(), ImportError>;

    /// Check if [`Importer::status`] is implemented.
    fn supports_status(&self) -> bool {
        false
    }

    /// Compare the checkout of `pkg` with what it tracks.
    fn status(&self, _pkg: &PackageRecord, _only_local: bool) -> Result<VcsStatus, ImportError> {
        Err(ImportError::Unsupported {
            kind: self.kind(),
            operation: "status",
        })
    }
}
