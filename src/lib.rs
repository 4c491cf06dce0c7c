//! flotilla - package selection and import engine for multi-repository workspaces
//!
//! This crate provides the core library functionality for flotilla:
//! resolving package selections, importing packages from their version
//! control systems in dependency order, propagating exclusions and
//! planning builds.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for flotilla unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted importer and workspace fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{
    package::PackageRecord, registry::Registry, selection::PackageSelection,
    workspace::Workspace,
};

pub use sources::Importer;
pub use util::context::GlobalContext;
