//! PackageRecord - one source package of the workspace.
//!
//! A record combines what the workspace configuration declares about a
//! package (VCS location, source directory, declared dependencies) with what
//! is learned while the workspace is processed (manifest dependencies,
//! enabled optional dependencies, build marks).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::manifest::PackageManifest;
use crate::sources::Importer;

/// The kind of version control a package is fetched from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Svn,
    Archive,
    /// Local-only package, never fetched.
    #[default]
    None,
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsKind::Git => write!(f, "git"),
            VcsKind::Svn => write!(f, "svn"),
            VcsKind::Archive => write!(f, "archive"),
            VcsKind::None => write!(f, "none"),
        }
    }
}

/// Source-control descriptor of a package, as written in `flotilla.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VcsDefinition {
    #[serde(rename = "type", default)]
    pub kind: VcsKind,

    /// Repository or archive URL
    #[serde(default)]
    pub url: Option<String>,

    /// Branch to follow (git)
    #[serde(default)]
    pub branch: Option<String>,

    /// Tag to pin (git)
    #[serde(default)]
    pub tag: Option<String>,

    /// Commit or revision to pin (git, svn)
    #[serde(default)]
    pub commit: Option<String>,

    /// Expected SHA256 of the archive (archive)
    #[serde(default)]
    pub sha256: Option<String>,

    /// Leading directory to strip when extracting (archive)
    #[serde(default)]
    pub strip_prefix: Option<String>,
}

impl VcsDefinition {
    /// A local-only definition.
    pub fn none() -> Self {
        VcsDefinition::default()
    }

    /// A git definition following the remote's default branch.
    pub fn git(url: impl Into<String>) -> Self {
        VcsDefinition {
            kind: VcsKind::Git,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Follow a specific branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Check if this package is local-only.
    pub fn is_none(&self) -> bool {
        self.kind == VcsKind::None
    }

    /// Key/value pairs for display, `type` and `url` first.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("type", self.kind.to_string())];
        let optional = [
            ("url", &self.url),
            ("branch", &self.branch),
            ("commit", &self.commit),
            ("sha256", &self.sha256),
            ("strip-prefix", &self.strip_prefix),
            ("tag", &self.tag),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }
}

impl fmt::Display for VcsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .to_pairs()
            .into_iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{}", pairs.join(", "))
    }
}

/// Build marks set by the build orchestrator and read by the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildMarks {
    /// Run every build phase even if the package looks up to date
    pub force: bool,

    /// Remove previous build products before building
    pub clean: bool,
}

/// A package known to the workspace.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    name: String,

    /// Hard dependencies, declared order
    dependencies: Vec<String>,

    /// Optional dependencies, declared order
    optional_dependencies: Vec<String>,

    /// Optional dependencies enabled by the last resolution pass
    enabled_optional: Option<Vec<String>>,

    vcs: VcsDefinition,

    importer: Option<Arc<dyn Importer>>,

    srcdir: PathBuf,

    description: Option<String>,

    /// Package set that defines this package, if any
    package_set: Option<String>,

    disabled: bool,
    imported: bool,
    prepared: bool,
    marks: BuildMarks,
}

impl PackageRecord {
    /// Create a local-only record with no dependencies.
    pub fn new(name: impl Into<String>, srcdir: impl Into<PathBuf>) -> Self {
        PackageRecord {
            name: name.into(),
            dependencies: Vec::new(),
            optional_dependencies: Vec::new(),
            enabled_optional: None,
            vcs: VcsDefinition::none(),
            importer: None,
            srcdir: srcdir.into(),
            description: None,
            package_set: None,
            disabled: false,
            imported: false,
            prepared: false,
            marks: BuildMarks::default(),
        }
    }

    /// Set the declared hard dependencies.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.clear();
        self.add_dependencies(deps);
        self
    }

    /// Set the declared optional dependencies.
    pub fn with_optional_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_dependencies.clear();
        self.add_optional_dependencies(deps);
        self
    }

    /// Set the VCS descriptor.
    pub fn with_vcs(mut self, vcs: VcsDefinition) -> Self {
        self.vcs = vcs;
        self
    }

    /// Attach an importer.
    pub fn with_importer(mut self, importer: Arc<dyn Importer>) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Record the package set defining this package.
    pub fn with_package_set(mut self, set: impl Into<String>) -> Self {
        self.package_set = Some(set.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hard dependencies.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Declared optional dependencies, enabled or not.
    pub fn optional_dependencies(&self) -> &[String] {
        &self.optional_dependencies
    }

    pub fn vcs(&self) -> &VcsDefinition {
        &self.vcs
    }

    pub fn importer(&self) -> Option<&Arc<dyn Importer>> {
        self.importer.as_ref()
    }

    pub fn srcdir(&self) -> &Path {
        &self.srcdir
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn package_set(&self) -> Option<&str> {
        self.package_set.as_deref()
    }

    /// Check if the source directory is present on disk.
    pub fn is_checked_out(&self) -> bool {
        self.srcdir.is_dir()
    }

    /// Append hard dependencies, skipping names already declared.
    pub fn add_dependencies<I, S>(&mut self, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if dep != self.name && !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
    }

    /// Append optional dependencies, skipping names already declared.
    pub fn add_optional_dependencies<I, S>(&mut self, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if dep != self.name && !self.optional_dependencies.contains(&dep) {
                self.optional_dependencies.push(dep);
            }
        }
    }

    /// Merge a loaded package manifest into this record.
    ///
    /// Returns the exclusion reason the manifest declares, if any.
    pub fn apply_manifest(&mut self, manifest: PackageManifest) -> Option<String> {
        let section = manifest.package;
        if section.description.is_some() {
            self.description = section.description;
        }
        self.add_dependencies(section.depends);
        self.add_optional_dependencies(section.optional_depends);
        section.excluded
    }

    /// Decide which optional dependencies are enabled.
    ///
    /// An optional dependency is enabled when `is_available` accepts it.
    /// Returns the enabled names in declared order.
    pub fn resolve_optional_dependencies<F>(&mut self, is_available: F) -> &[String]
    where
        F: Fn(&str) -> bool,
    {
        let enabled: Vec<String> = self
            .optional_dependencies
            .iter()
            .filter(|dep| !self.dependencies.contains(dep) && is_available(dep))
            .cloned()
            .collect();
        self.enabled_optional.insert(enabled)
    }

    /// Optional dependencies enabled by the last resolution, empty before it.
    pub fn enabled_optional_dependencies(&self) -> &[String] {
        self.enabled_optional.as_deref().unwrap_or(&[])
    }

    /// Optional dependencies left out by the last resolution.
    pub fn disabled_optional_dependencies(&self) -> Vec<&str> {
        let enabled = self.enabled_optional_dependencies();
        self.optional_dependencies
            .iter()
            .filter(|dep| !enabled.contains(dep) && !self.dependencies.contains(dep))
            .map(String::as_str)
            .collect()
    }

    /// Hard dependencies followed by the enabled optional ones.
    pub fn effective_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .chain(self.enabled_optional_dependencies())
            .map(String::as_str)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Keep the package out of the build without excluding it.
    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn is_imported(&self) -> bool {
        self.imported
    }

    pub fn mark_imported(&mut self) {
        self.imported = true;
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Mark the package ready to build.
    pub fn prepare(&mut self) {
        self.prepared = true;
    }

    pub fn marks(&self) -> BuildMarks {
        self.marks
    }

    /// Force every build phase on the next build.
    pub fn prepare_for_forced_build(&mut self) {
        self.marks.force = true;
    }

    /// Clean the build products before the next build.
    pub fn prepare_for_rebuild(&mut self) {
        self.marks.force = true;
        self.marks.clean = true;
    }
}
