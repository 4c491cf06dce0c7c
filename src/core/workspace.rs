//! Workspace - the context object every operation works on.
//!
//! A Workspace owns the package registry, the exclusion table and the
//! ignore list of one workspace root. It is built from `flotilla.toml`
//! before any package is imported and is then only mutated by the
//! import engine (manifest loading, exclusions) and the build orchestrator
//! (build marks).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;

use crate::core::errors::FlotillaError;
use crate::core::manifest::{ManifestLoader, TomlManifestLoader, WorkspaceManifest};
use crate::core::registry::{Metapackage, PackageSet, Registry};
use crate::sources::importer_for;

/// Name of the workspace definition file.
pub const WORKSPACE_FILE: &str = "flotilla.toml";

/// Reason recorded for packages listed in `[workspace] exclude`.
pub const EXCLUDE_LIST_REASON: &str = "listed in the workspace exclude list";

/// Why a package cannot be built in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    name: String,
    reason: String,
    /// Names from the root cause to this package, empty for a root cause
    chain: Vec<String>,
}

impl Exclusion {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Check if the package was excluded for its own sake.
    pub fn is_root_cause(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Exclusion table. Entries are never removed within a run.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    entries: BTreeMap<String, Exclusion>,
}

impl Exclusions {
    pub fn new() -> Self {
        Exclusions::default()
    }

    /// Record an exclusion.
    ///
    /// Returns false, leaving the first reason in place, when `name` is
    /// already excluded.
    pub fn add(&mut self, name: &str, reason: impl Into<String>, chain: Vec<String>) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        let reason = reason.into();
        tracing::debug!("excluding {}: {}", name, reason);
        self.entries.insert(
            name.to_string(),
            Exclusion {
                name: name.to_string(),
                reason,
                chain,
            },
        );
        true
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Exclusion> {
        self.entries.get(name)
    }

    pub fn reason(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.reason.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exclusion> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A loaded workspace.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    name: String,
    registry: Registry,
    /// Default selectors
    layout: Vec<String>,
    exclusions: Exclusions,
    ignored: BTreeSet<String>,
    manifest_loader: Box<dyn ManifestLoader>,
}

impl Workspace {
    /// Create an empty workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string());

        Workspace {
            root,
            name,
            registry: Registry::new(),
            layout: Vec::new(),
            exclusions: Exclusions::new(),
            ignored: BTreeSet::new(),
            manifest_loader: Box::new(TomlManifestLoader),
        }
    }

    /// Load a workspace from its `flotilla.toml`.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let manifest = WorkspaceManifest::load(manifest_path)?;
        let current = Version::parse(env!("CARGO_PKG_VERSION"))?;
        manifest.check_version(&current)?;

        let root = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let source_root = match &manifest.workspace.source_root {
            Some(dir) => root.join(dir),
            None => root.clone(),
        };

        let mut ws = Workspace::new(root).with_layout(manifest.workspace.layout.clone());
        if let Some(name) = &manifest.workspace.name {
            ws = ws.with_name(name.clone());
        }

        for name in manifest.package.keys() {
            let Some(mut record) = manifest.package_record(name, &source_root) else {
                continue;
            };
            if let Some(importer) = importer_for(record.vcs())
                .with_context(|| format!("invalid VCS definition for package `{}`", name))?
            {
                record = record.with_importer(importer);
            }
            ws.registry.register(record);
        }

        for (name, decl) in &manifest.package_sets {
            if let Some(missing) = decl.packages.iter().find(|p| !ws.registry.contains(p)) {
                return Err(FlotillaError::Config {
                    message: format!(
                        "package set `{}` lists `{}`, which is not defined as a package",
                        name, missing
                    ),
                }
                .into());
            }
            ws.registry
                .add_package_set(PackageSet::new(name.clone(), decl.packages.clone()));
        }

        for (name, decl) in &manifest.metapackages {
            ws.registry
                .add_metapackage(Metapackage::new(name.clone(), decl.includes.clone()));
        }

        for name in &manifest.workspace.exclude {
            ws.add_exclusion(name, EXCLUDE_LIST_REASON);
        }
        for name in &manifest.workspace.ignore {
            ws.ignore(name);
        }

        tracing::debug!(
            "loaded workspace {} with {} packages",
            ws.name,
            ws.registry.len()
        );
        Ok(ws)
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default selectors.
    pub fn with_layout(mut self, layout: Vec<String>) -> Self {
        self.layout = layout;
        self
    }

    /// Replace the package manifest loader.
    pub fn with_manifest_loader(mut self, loader: Box<dyn ManifestLoader>) -> Self {
        self.manifest_loader = loader;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &[String] {
        &self.layout
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    pub(crate) fn exclusions_mut(&mut self) -> &mut Exclusions {
        &mut self.exclusions
    }

    /// Exclude a package for its own sake.
    ///
    /// Returns false if it was already excluded.
    pub fn add_exclusion(&mut self, name: &str, reason: impl Into<String>) -> bool {
        self.exclusions.add(name, reason, Vec::new())
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.is_excluded(name)
    }

    pub fn exclusion_reason(&self, name: &str) -> Option<&str> {
        self.exclusions.reason(name)
    }

    /// Leave a package out of the workspace without a reason.
    pub fn ignore(&mut self, name: &str) {
        self.ignored.insert(name.to_string());
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    pub fn ignored(&self) -> impl Iterator<Item = &str> {
        self.ignored.iter().map(String::as_str)
    }

    /// Selectors used when the command line names none.
    ///
    /// This is the layout, or every package when the layout is empty.
    pub fn default_selectors(&self) -> Vec<String> {
        if self.layout.is_empty() {
            self.registry.names().map(str::to_string).collect()
        } else {
            self.layout.clone()
        }
    }

    /// Load the manifest of an imported package and merge it into its record.
    ///
    /// Unreadable manifests are reported and treated as absent. A manifest
    /// declaring the package excluded records the exclusion.
    pub fn load_package_manifest(&mut self, name: &str) {
        let Some(record) = self.registry.find(name) else {
            return;
        };

        let manifest = match self.manifest_loader.load_manifest(record) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!("ignoring manifest of {}: {:#}", name, err);
                return;
            }
        };

        let excluded = self
            .registry
            .find_mut(name)
            .and_then(|record| record.apply_manifest(manifest));
        if let Some(reason) = excluded {
            self.add_exclusion(name, reason);
        }
    }
}

/// Find `flotilla.toml` by walking up from `start`.
pub fn find_workspace_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(WORKSPACE_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }

        if !current.pop() {
            return None;
        }
    }
}
