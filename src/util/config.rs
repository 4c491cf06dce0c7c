//! User configuration for flotilla.
//!
//! Two configuration file locations are read:
//! - Global: `~/.flotilla/config.toml` - user-wide defaults
//! - Project: `<workspace>/.flotilla/config.toml` - workspace overrides
//!
//! Project config takes precedence over global config. Command line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::shell::ColorChoice;

/// flotilla configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Import settings
    pub import: ImportConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Output settings
    pub ui: UiConfig,
}

/// Import-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImportConfig {
    /// Never access the network for existing checkouts
    pub only_local: Option<bool>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Extend --force/--rebuild to the dependencies of the selection
    pub with_depends: Option<bool>,

    /// Build the dependencies of the selection
    pub deps: Option<bool>,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UiConfig {
    /// Show progress bars
    pub progress: Option<bool>,

    /// auto, always or never
    pub color: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.import.only_local.is_some() {
            self.import.only_local = other.import.only_local;
        }

        if other.build.with_depends.is_some() {
            self.build.with_depends = other.build.with_depends;
        }
        if other.build.deps.is_some() {
            self.build.deps = other.build.deps;
        }

        if other.ui.progress.is_some() {
            self.ui.progress = other.ui.progress;
        }
        if other.ui.color.is_some() {
            self.ui.color = other.ui.color;
        }
    }

    pub fn only_local(&self) -> bool {
        self.import.only_local.unwrap_or(false)
    }

    pub fn with_depends(&self) -> bool {
        self.build.with_depends.unwrap_or(false)
    }

    /// Whether dependencies are built along with the selection.
    pub fn deps(&self) -> bool {
        self.build.deps.unwrap_or(true)
    }

    pub fn progress(&self) -> bool {
        self.ui.progress.unwrap_or(true)
    }

    /// Parse color choice from config string.
    pub fn color(&self) -> Option<ColorChoice> {
        self.ui.color.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Get the global configuration directory.
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".flotilla"))
}

/// Get the global configuration file path.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|d| d.join("config.toml"))
}

/// Get the project configuration file path.
pub fn project_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".flotilla").join("config.toml")
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.flotilla/config.toml)
/// 2. Global config (~/.flotilla/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));
    config
}
