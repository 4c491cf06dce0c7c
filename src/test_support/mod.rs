//! Test utilities and mocks for flotilla unit tests.
//!
//! The engine only talks to version control through the [`Importer`] trait,
//! so most tests replace the real backends with a [`MockImporter`] that
//! creates source directories on demand and records every call.
//!
//! # Example
//!
//! ```rust,ignore
//! use flotilla::test_support::{MockImporter, WorkspaceBuilder};
//!
//! #[test]
//! fn test_example() {
//!     let tmp = TempDir::new().unwrap();
//!     let importer = MockImporter::new().with_failure("base", "host unreachable");
//!     let ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
//!         .package("base", &[])
//!         .package("app", &["base"])
//!         .build();
//!
//!     // Run the import engine and inspect importer.calls()...
//! }
//! ```

pub mod fixtures;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::core::manifest::PACKAGE_MANIFEST_FILE;
use crate::core::package::{PackageRecord, VcsKind};
use crate::sources::{ImportError, Importer, VcsStatus};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Scripted importer.
///
/// Importing a package creates its source directory and, when one was
/// scripted, writes its package manifest. Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct MockImporter {
    /// Package -> import error message
    failures: BTreeMap<String, String>,
    /// Package -> manifest written on import
    manifests: BTreeMap<String, String>,
    /// Package -> status answer
    statuses: BTreeMap<String, VcsStatus>,
    /// Package -> status error message
    status_failures: BTreeMap<String, String>,
    /// Import calls in order, as (package, only_local)
    calls: Arc<Mutex<Vec<(String, bool)>>>,
}

impl MockImporter {
    pub fn new() -> Self {
        MockImporter::default()
    }

    /// Make the import of `name` fail with `message`.
    pub fn with_failure(mut self, name: &str, message: &str) -> Self {
        self.failures.insert(name.to_string(), message.to_string());
        self
    }

    /// Write `contents` as the package manifest of `name` when it is imported.
    pub fn with_manifest(mut self, name: &str, contents: impl Into<String>) -> Self {
        self.manifests.insert(name.to_string(), contents.into());
        self
    }

    pub fn with_status(mut self, name: &str, status: VcsStatus) -> Self {
        self.statuses.insert(name.to_string(), status);
        self
    }

    pub fn with_status_failure(mut self, name: &str, message: &str) -> Self {
        self.status_failures
            .insert(name.to_string(), message.to_string());
        self
    }

    /// Packages imported so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Import calls with their `only_local` flag.
    pub fn calls_with_flags(&self) -> Vec<(String, bool)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of times `name` was imported.
    pub fn import_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|n| *n == name).count()
    }

    /// Wrap into the shared form package records hold.
    pub fn shared(&self) -> Arc<dyn Importer> {
        Arc::new(self.clone())
    }
}

impl Importer for MockImporter {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn import(&self, pkg: &PackageRecord, only_local: bool) -> Result<(), ImportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((pkg.name().to_string(), only_local));
        }

        if let Some(message) = self.failures.get(pkg.name()) {
            return Err(ImportError::Failed(message.clone()));
        }

        std::fs::create_dir_all(pkg.srcdir())?;
        if let Some(contents) = self.manifests.get(pkg.name()) {
            std::fs::write(pkg.srcdir().join(PACKAGE_MANIFEST_FILE), contents)?;
        }
        Ok(())
    }

    fn supports_status(&self) -> bool {
        true
    }

    fn status(&self, pkg: &PackageRecord, _only_local: bool) -> Result<VcsStatus, ImportError> {
        if let Some(message) = self.status_failures.get(pkg.name()) {
            return Err(ImportError::Failed(message.clone()));
        }
        Ok(self
            .statuses
            .get(pkg.name())
            .cloned()
            .unwrap_or_else(VcsStatus::up_to_date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mock_importer_creates_checkout() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_manifest("base", "[package]\n");
        let record = PackageRecord::new("base", tmp.path().join("base"));

        importer.import(&record, true).unwrap();

        assert!(record.srcdir().join(PACKAGE_MANIFEST_FILE).is_file());
        assert_eq!(importer.calls_with_flags(), [("base".to_string(), true)]);
    }

    #[test]
    fn test_mock_importer_failure() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_failure("base", "host unreachable");
        let record = PackageRecord::new("base", tmp.path().join("base"));

        let err = importer.import(&record, false).unwrap_err();
        assert_eq!(err.to_string(), "host unreachable");
        assert!(!record.is_checked_out());
        assert_eq!(importer.import_count("base"), 1);
    }
}
