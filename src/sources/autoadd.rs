//! Auto-add - ad-hoc packages for directories the workspace does not define.
//!
//! When a selector names a directory that no package owns, the selection
//! resolver asks an [`AutoAddHandler`] whether the directory looks like a
//! buildable package and, if so, registers a local-only record for it.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::package::PackageRecord;

/// Build system recognised in a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Cmake,
    Cargo,
    Python,
    Autotools,
    Make,
}

impl HandlerKind {
    /// Marker files, in detection priority order.
    const MARKERS: [(&'static str, HandlerKind); 7] = [
        ("CMakeLists.txt", HandlerKind::Cmake),
        ("Cargo.toml", HandlerKind::Cargo),
        ("pyproject.toml", HandlerKind::Python),
        ("setup.py", HandlerKind::Python),
        ("configure.ac", HandlerKind::Autotools),
        ("configure", HandlerKind::Autotools),
        ("Makefile", HandlerKind::Make),
    ];

    /// Recognise the build system of `dir`.
    pub fn detect_in(dir: &Path) -> Option<HandlerKind> {
        Self::MARKERS
            .iter()
            .find(|(marker, _)| dir.join(marker).is_file())
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerKind::Cmake => "cmake",
            HandlerKind::Cargo => "cargo",
            HandlerKind::Python => "python",
            HandlerKind::Autotools => "autotools",
            HandlerKind::Make => "make",
        };
        write!(f, "{}", name)
    }
}

/// Creates package records for unknown directories.
pub trait AutoAddHandler: fmt::Debug {
    /// Find the directory owning `path` and its build system.
    fn detect(&self, path: &Path) -> Option<(HandlerKind, PathBuf)>;

    /// Create a record for the package at `relative_path` (from the workspace root).
    fn create(&self, kind: HandlerKind, relative_path: &Path) -> Result<PackageRecord>;
}

/// Detects packages from build system marker files.
#[derive(Debug, Clone)]
pub struct BuildSystemDetector {
    root: PathBuf,
}

impl BuildSystemDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BuildSystemDetector { root: root.into() }
    }
}

impl AutoAddHandler for BuildSystemDetector {
    fn detect(&self, path: &Path) -> Option<(HandlerKind, PathBuf)> {
        let mut current = path.to_path_buf();
        while current.starts_with(&self.root) && current != self.root {
            if let Some(kind) = HandlerKind::detect_in(&current) {
                return Some((kind, current));
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    fn create(&self, kind: HandlerKind, relative_path: &Path) -> Result<PackageRecord> {
        if relative_path.as_os_str().is_empty() || relative_path.is_absolute() {
            bail!(
                "cannot auto-add `{}`: expected a path relative to the workspace root",
                relative_path.display()
            );
        }

        let name = relative_path.to_string_lossy().replace('\\', "/");
        tracing::debug!("auto-adding {} as a {} package", name, kind);
        Ok(PackageRecord::new(name, self.root.join(relative_path))
            .with_description(format!("auto-added {} package", kind)))
    }
}
