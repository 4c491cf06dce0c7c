//! Global context for flotilla operations.
//!
//! Provides centralized access to the invocation directory, the workspace
//! location and the merged user configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::errors::FlotillaError;
use crate::core::workspace::{find_workspace_file, Workspace, WORKSPACE_FILE};
use crate::util::config::{global_config_path, load_config, project_config_path, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Workspace directory given on the command line
    workspace_dir: Option<PathBuf>,

    /// Global config file, `None` when there is no home directory
    global_config: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(GlobalContext {
            cwd,
            workspace_dir: None,
            global_config: global_config_path(),
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Look for the workspace in `dir` instead of above the working directory.
    pub fn with_workspace_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.workspace_dir = dir.map(|d| self.cwd.join(d));
        self
    }

    /// Use a different global config file.
    pub fn with_global_config(mut self, path: Option<PathBuf>) -> Self {
        self.global_config = path;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Find `flotilla.toml`, searching upward from the working directory.
    pub fn find_workspace_file(&self) -> Result<PathBuf, FlotillaError> {
        let start = self.workspace_dir.as_deref().unwrap_or(&self.cwd);
        find_workspace_file(start).ok_or_else(|| FlotillaError::WorkspaceNotFound {
            dir: start.to_path_buf(),
            file: WORKSPACE_FILE.to_string(),
        })
    }

    /// Load the workspace the command runs in.
    pub fn load_workspace(&self) -> Result<Workspace> {
        let path = self.find_workspace_file()?;
        Workspace::load(&path)
    }

    /// Load the user configuration for the workspace rooted at `root`.
    pub fn load_config(&self, root: &Path) -> Config {
        load_config(self.global_config.as_deref(), &project_config_path(root))
    }
}
