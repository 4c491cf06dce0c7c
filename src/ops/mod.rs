//! High-level operations.
//!
//! This module contains the implementation of flotilla commands.

pub mod build;
pub mod import;
pub mod selection;
pub mod show;
pub mod status;
pub mod update;

pub use build::{build, BuildMode, BuildOptions, BuildPlan, Builder, Confirm, PlanPrinter};
pub use import::{
    import_packages, import_single_package, ImportObserver, ImportOptions, SilentObserver,
};
pub use selection::{resolve_selection, resolve_selection_with, validate_selection, SelectionOptions};
pub use show::{show, PackageInfo};
pub use status::{collect_status, StatusReport, StatusResult};
pub use update::{configuration_package, update, update_configuration, ConfigUpdate, UpdateOptions};
