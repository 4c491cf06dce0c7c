//! Test fixtures for common test scenarios.
//!
//! This module provides in-memory workspace builders and writers for the
//! on-disk files flotilla reads.

use std::path::{Path, PathBuf};

use crate::core::manifest::PACKAGE_MANIFEST_FILE;
use crate::core::package::PackageRecord;
use crate::core::registry::{Metapackage, PackageSet};
use crate::core::workspace::{Workspace, WORKSPACE_FILE};
use crate::test_support::MockImporter;

/// Builds a [`Workspace`] without going through `flotilla.toml`.
///
/// Packages added with [`WorkspaceBuilder::package`] are imported through
/// the shared [`MockImporter`]; their source directory is `<root>/<name>`.
#[derive(Debug)]
pub struct WorkspaceBuilder {
    root: PathBuf,
    importer: MockImporter,
    records: Vec<PackageRecord>,
    layout: Vec<String>,
    sets: Vec<PackageSet>,
    metapackages: Vec<Metapackage>,
}

impl WorkspaceBuilder {
    pub fn new(root: &Path, importer: MockImporter) -> Self {
        WorkspaceBuilder {
            root: root.to_path_buf(),
            importer,
            records: Vec::new(),
            layout: Vec::new(),
            sets: Vec::new(),
            metapackages: Vec::new(),
        }
    }

    /// Add a package imported by the mock importer.
    pub fn package(mut self, name: &str, depends: &[&str]) -> Self {
        let record = PackageRecord::new(name, self.root.join(name))
            .with_dependencies(depends.iter().copied())
            .with_importer(self.importer.shared());
        self.records.push(record);
        self
    }

    /// Add a package with hard and optional dependencies.
    pub fn package_with_optional(mut self, name: &str, depends: &[&str], optional: &[&str]) -> Self {
        let record = PackageRecord::new(name, self.root.join(name))
            .with_dependencies(depends.iter().copied())
            .with_optional_dependencies(optional.iter().copied())
            .with_importer(self.importer.shared());
        self.records.push(record);
        self
    }

    /// Add a package without VCS whose directory already exists.
    pub fn local_package(mut self, name: &str, depends: &[&str]) -> Self {
        let srcdir = self.root.join(name);
        let _ = std::fs::create_dir_all(&srcdir);
        self.records
            .push(PackageRecord::new(name, srcdir).with_dependencies(depends.iter().copied()));
        self
    }

    pub fn record(mut self, record: PackageRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn layout(mut self, layout: &[&str]) -> Self {
        self.layout = layout.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn package_set(mut self, name: &str, packages: &[&str]) -> Self {
        self.sets.push(PackageSet::new(
            name,
            packages.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn metapackage(mut self, name: &str, includes: &[&str]) -> Self {
        self.metapackages.push(Metapackage::new(
            name,
            includes.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> Workspace {
        let mut ws = Workspace::new(&self.root).with_layout(self.layout);
        for record in self.records {
            ws.registry_mut().register(record);
        }
        for set in self.sets {
            ws.registry_mut().add_package_set(set);
        }
        for meta in self.metapackages {
            ws.registry_mut().add_metapackage(meta);
        }
        ws
    }
}

/// Package manifest contents declaring the given dependencies.
pub fn package_manifest(depends: &[&str], optional: &[&str]) -> String {
    let list = |names: &[&str]| {
        names
            .iter()
            .map(|n| format!("\"{}\"", n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "[package]\ndepends = [{}]\noptional-depends = [{}]\n",
        list(depends),
        list(optional)
    )
}

/// Write `flotilla.toml` into `dir`.
pub fn write_workspace_file(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join(WORKSPACE_FILE);
    std::fs::write(&path, contents).expect("failed to write workspace file");
    path
}

/// Write a package manifest into `srcdir`, creating the directory.
pub fn write_package_manifest(srcdir: &Path, contents: &str) {
    std::fs::create_dir_all(srcdir).expect("failed to create package directory");
    std::fs::write(srcdir.join(PACKAGE_MANIFEST_FILE), contents)
        .expect("failed to write package manifest");
}
