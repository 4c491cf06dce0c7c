//! Workspace and package manifest schemas.
//!
//! Two files are involved:
//! - `flotilla.toml` at the workspace root declares packages, package sets,
//!   metapackages and the default layout.
//! - `flotilla-package.toml` inside a package's source directory declares
//!   the dependencies the package itself knows about. It only becomes
//!   readable once the package has been imported.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::{Version, VersionReq};
use serde::Deserialize;

use crate::core::errors::FlotillaError;
use crate::core::package::{PackageRecord, VcsDefinition};

/// File name of the per-package manifest.
pub const PACKAGE_MANIFEST_FILE: &str = "flotilla-package.toml";

/// The parsed `flotilla.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkspaceManifest {
    #[serde(default)]
    pub workspace: WorkspaceSection,

    #[serde(default)]
    pub package: BTreeMap<String, PackageDecl>,

    #[serde(default, rename = "package-set")]
    pub package_sets: BTreeMap<String, PackageSetDecl>,

    #[serde(default, rename = "metapackage")]
    pub metapackages: BTreeMap<String, MetapackageDecl>,
}

/// The `[workspace]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkspaceSection {
    /// Display name (defaults to the root directory name)
    #[serde(default)]
    pub name: Option<String>,

    /// Requirement on the flotilla version reading this file
    #[serde(default)]
    pub required_version: Option<VersionReq>,

    /// Selectors built when no selection is given on the command line
    #[serde(default)]
    pub layout: Vec<String>,

    /// Packages that cannot be built in this workspace
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Packages that are present but not handled by flotilla
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Directory, relative to the root, under which sources are checked out
    #[serde(default)]
    pub source_root: Option<PathBuf>,
}

/// A `[package.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageDecl {
    /// Source directory, relative to the source root
    #[serde(default)]
    pub srcdir: Option<PathBuf>,

    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default)]
    pub optional_depends: Vec<String>,

    #[serde(default)]
    pub vcs: Option<VcsDefinition>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A `[package-set.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageSetDecl {
    #[serde(default)]
    pub packages: Vec<String>,
}

/// A `[metapackage.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetapackageDecl {
    #[serde(default)]
    pub includes: Vec<String>,
}

impl WorkspaceManifest {
    /// Load the workspace manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workspace manifest: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse workspace manifest: {}", path.display()))
    }

    /// Parse the workspace manifest from a string.
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: WorkspaceManifest = toml::from_str(contents)?;
        Ok(manifest)
    }

    /// Check the `required-version` requirement against `current`.
    pub fn check_version(&self, current: &Version) -> Result<(), FlotillaError> {
        match &self.workspace.required_version {
            Some(req) if !req.matches(current) => Err(FlotillaError::VersionMismatch {
                required: req.to_string(),
                current: current.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Build the record of a declared package.
    ///
    /// `source_root` is the directory relative source directories are
    /// resolved against; the package name is used when `srcdir` is absent.
    pub fn package_record(&self, name: &str, source_root: &Path) -> Option<PackageRecord> {
        let decl = self.package.get(name)?;
        let srcdir = match &decl.srcdir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => source_root.join(dir),
            None => source_root.join(name),
        };

        let mut record = PackageRecord::new(name, srcdir)
            .with_dependencies(decl.depends.iter().cloned())
            .with_optional_dependencies(decl.optional_depends.iter().cloned())
            .with_vcs(decl.vcs.clone().unwrap_or_default());
        if let Some(description) = &decl.description {
            record = record.with_description(description.clone());
        }
        if let Some((set, _)) = self
            .package_sets
            .iter()
            .find(|(_, decl)| decl.packages.iter().any(|p| p == name))
        {
            record = record.with_package_set(set.clone());
        }
        Some(record)
    }
}

/// The parsed `flotilla-package.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub package: PackageManifestSection,
}

/// The `[package]` section of a package manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageManifestSection {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default)]
    pub optional_depends: Vec<String>,

    /// Set when the package knows it cannot be built here
    #[serde(default)]
    pub excluded: Option<String>,
}

impl PackageManifest {
    /// Parse a package manifest from a string.
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: PackageManifest = toml::from_str(contents)?;
        Ok(manifest)
    }
}

/// Reads the manifest of an imported package.
pub trait ManifestLoader: fmt::Debug {
    /// Load the manifest of `pkg`.
    ///
    /// Returns `Ok(None)` when the package has no manifest.
    fn load_manifest(&self, pkg: &PackageRecord) -> Result<Option<PackageManifest>>;
}

/// Loads `flotilla-package.toml` from the package source directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlManifestLoader;

impl ManifestLoader for TomlManifestLoader {
    fn load_manifest(&self, pkg: &PackageRecord) -> Result<Option<PackageManifest>> {
        let path = pkg.srcdir().join(PACKAGE_MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest = PackageManifest::parse(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(manifest))
    }
}
