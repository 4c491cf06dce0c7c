//! Registry - every package, package set and metapackage of a workspace.
//!
//! The registry is filled once by configuration loading and then consumed
//! by selection, import and reporting. The import engine only mutates the
//! per-record state (imported flag, loaded dependencies, build marks).

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::package::PackageRecord;

/// A named collection of package definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSet {
    name: String,
    packages: Vec<String>,
}

impl PackageSet {
    pub fn new(name: impl Into<String>, packages: Vec<String>) -> Self {
        PackageSet {
            name: name.into(),
            packages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p == name)
    }
}

/// A named group of packages, package sets and other metapackages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metapackage {
    name: String,
    includes: Vec<String>,
}

impl Metapackage {
    pub fn new(name: impl Into<String>, includes: Vec<String>) -> Self {
        Metapackage {
            name: name.into(),
            includes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }
}

/// Name-indexed package records.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    packages: BTreeMap<String, PackageRecord>,
    package_sets: BTreeMap<String, PackageSet>,
    metapackages: BTreeMap<String, Metapackage>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Add a package, returning the record it replaces.
    pub fn register(&mut self, record: PackageRecord) -> Option<PackageRecord> {
        let previous = self.packages.insert(record.name().to_string(), record);
        if let Some(prev) = &previous {
            tracing::debug!("package {} redefined", prev.name());
        }
        previous
    }

    pub fn add_package_set(&mut self, set: PackageSet) {
        self.package_sets.insert(set.name().to_string(), set);
    }

    pub fn add_metapackage(&mut self, meta: Metapackage) {
        self.metapackages.insert(meta.name().to_string(), meta);
    }

    /// Look a package up by name.
    pub fn find(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut PackageRecord> {
        self.packages.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn package_set(&self, name: &str) -> Option<&PackageSet> {
        self.package_sets.get(name)
    }

    pub fn package_sets(&self) -> impl Iterator<Item = &PackageSet> {
        self.package_sets.values()
    }

    pub fn metapackage(&self, name: &str) -> Option<&Metapackage> {
        self.metapackages.get(name)
    }

    pub fn metapackages(&self) -> impl Iterator<Item = &Metapackage> {
        self.metapackages.values()
    }

    /// Iterate over all records in name order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.values()
    }

    /// All package names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Find the package whose source directory is exactly `dir`.
    pub fn owner_of(&self, dir: &Path) -> Option<&PackageRecord> {
        self.packages.values().find(|p| p.srcdir() == dir)
    }
}
