//! Dependency graph resolution.
//!
//! The dependency graph of a workspace is only known piece by piece, as
//! packages are imported. This module holds the two graph walks run over it:
//! exclusion propagation along reverse hard dependencies, and the fixed-point
//! pass that enables optional dependencies.

pub mod exclusion;
pub mod optional;

pub use exclusion::{mark_excluded, ReverseDependencies};
pub use optional::resolve_optional_dependencies;
