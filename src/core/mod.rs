//! Core data structures for flotilla.
//!
//! This module contains the types every operation shares:
//! - Package records and their VCS definitions
//! - The registry of packages, package sets and metapackages
//! - Package selections
//! - The workspace context and its manifests

pub mod errors;
pub mod manifest;
pub mod package;
pub mod registry;
pub mod selection;
pub mod workspace;

pub use errors::FlotillaError;
pub use manifest::{ManifestLoader, PackageManifest, WorkspaceManifest};
pub use package::{BuildMarks, PackageRecord, VcsDefinition, VcsKind};
pub use registry::{Metapackage, PackageSet, Registry};
pub use selection::PackageSelection;
pub use workspace::{find_workspace_file, Exclusion, Exclusions, Workspace, WORKSPACE_FILE};
