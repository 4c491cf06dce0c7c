//! Implementation of `flotilla update`.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::package::PackageRecord;
use crate::core::selection::PackageSelection;
use crate::core::workspace::Workspace;
use crate::ops::import::{import_packages, import_single_package, ImportObserver, ImportOptions};
use crate::sources::{GitImporter, Importer};

/// Options for the update command.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub import: ImportOptions,

    /// Also import the dependencies of the selection
    pub deps: bool,
}

/// What happened to the workspace configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigUpdate {
    Updated,
    /// The workspace root is not a git checkout
    NotVersioned,
}

/// Record standing for the workspace configuration itself.
///
/// Returns `None` when the workspace root is not a git checkout with an
/// `origin` remote.
pub fn configuration_package(ws: &Workspace) -> Result<Option<PackageRecord>> {
    let Some(importer) = GitImporter::from_checkout(ws.root())
        .context("failed to inspect the workspace configuration checkout")?
    else {
        return Ok(None);
    };
    let importer: Arc<dyn Importer> = Arc::new(importer);
    Ok(Some(
        PackageRecord::new(ws.name(), ws.root()).with_importer(importer),
    ))
}

/// Update the checkout holding `flotilla.toml`.
///
/// The workspace has to be loaded again afterwards for changes to take
/// effect.
pub fn update_configuration(ws: &Workspace, only_local: bool) -> Result<ConfigUpdate> {
    let Some(record) = configuration_package(ws)? else {
        tracing::debug!("{} is not under version control", ws.root().display());
        return Ok(ConfigUpdate::NotVersioned);
    };

    if let Some(importer) = record.importer() {
        importer
            .import(&record, only_local)
            .context("failed to update the workspace configuration")?;
    }
    Ok(ConfigUpdate::Updated)
}

/// Import the resolved selection.
///
/// With dependencies, this runs the full import engine. Without, each
/// selected package is imported on its own and the selection is what gets
/// enabled.
pub fn update(
    ws: &mut Workspace,
    selection: &mut PackageSelection,
    opts: &UpdateOptions,
    observer: &mut dyn ImportObserver,
) -> Result<BTreeSet<String>> {
    if opts.deps {
        return import_packages(ws, selection, &opts.import, observer);
    }

    let names: Vec<String> = selection.packages().map(str::to_string).collect();
    observer.queued(names.len());
    for name in &names {
        observer.importing(name);
        import_single_package(ws, name, &opts.import)?;
        match ws.exclusion_reason(name) {
            Some(reason) => observer.excluded(name, reason),
            None => observer.imported(name),
        }
    }

    selection.filter_excluded_and_ignored(ws);
    Ok(selection.packages().map(str::to_string).collect())
}
