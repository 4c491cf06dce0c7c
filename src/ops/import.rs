//! The import engine.
//!
//! Packages are imported breadth-first starting from the selection. The
//! dependencies of a package are only known once it has been imported and
//! its manifest read, so the queue grows as the import proceeds. A package
//! that cannot be imported is excluded, and so is everything known to
//! depend on it; the rest of the workspace carries on.
//!
//! Once every hard dependency is in place, the optional dependencies are
//! resolved in a second pass (see [`crate::resolver::optional`]).

use std::collections::{BTreeSet, VecDeque};

use anyhow::Result;

use crate::core::errors::FlotillaError;
use crate::core::selection::PackageSelection;
use crate::core::workspace::Workspace;
use crate::resolver::{mark_excluded, resolve_optional_dependencies, ReverseDependencies};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::shell::{Progress, Status};

/// Options for the import engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Do not access the network for packages that are already checked out
    pub only_local: bool,

    /// Only check out missing packages, leave existing checkouts untouched
    pub only_checkout: bool,
}

/// Receives import progress.
pub trait ImportObserver {
    /// The number of packages known to need importing changed.
    fn queued(&mut self, _total: usize) {}

    fn importing(&mut self, _name: &str) {}

    fn imported(&mut self, _name: &str) {}

    fn excluded(&mut self, _name: &str, _reason: &str) {}

    fn warning(&mut self, _diag: &Diagnostic) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl ImportObserver for SilentObserver {}

impl ImportObserver for Progress {
    fn queued(&mut self, total: usize) {
        self.set_total(total as u64);
    }

    fn importing(&mut self, name: &str) {
        self.set_message(name);
    }

    fn imported(&mut self, name: &str) {
        self.status(Status::Imported, name);
        self.inc(1);
    }

    fn excluded(&mut self, name: &str, reason: &str) {
        self.status(Status::Excluded, format!("{}: {}", name, reason));
        self.inc(1);
    }

    fn warning(&mut self, diag: &Diagnostic) {
        self.diagnostic(diag);
    }
}

/// Import the selection and everything it depends on.
///
/// Returns the packages enabled for this run: the selection plus the
/// transitive closure of their effective dependencies, excluded packages
/// removed. Import failures never abort the run; they exclude the failing
/// package and its dependents and are reported as warnings at the end.
pub fn import_packages(
    ws: &mut Workspace,
    selection: &mut PackageSelection,
    opts: &ImportOptions,
    observer: &mut dyn ImportObserver,
) -> Result<BTreeSet<String>> {
    let mut queue = ImportQueue::default();
    for name in selection.packages() {
        if !ws.registry().contains(name) {
            return Err(FlotillaError::UnknownPackage {
                name: name.to_string(),
            }
            .into());
        }
        queue.push(name);
    }

    let mut processed = BTreeSet::new();
    let mut reverse = ReverseDependencies::new();
    let observer = &mut ReportOnce::new(observer);
    observer.queued(queue.len());

    while let Some(name) = queue.pop() {
        if !processed.insert(name.clone()) {
            continue;
        }

        if !ws.is_excluded(&name) {
            observer.importing(&name);
            import_single_package(ws, &name, opts)?;
        }

        if let Some(reason) = ws.exclusion_reason(&name) {
            observer.excluded(&name, reason);
            propagate_exclusion(ws, &name, &reverse, selection, observer);
            continue;
        }
        observer.imported(&name);

        let Some(record) = ws.registry().find(&name) else {
            continue;
        };
        let dependencies = record.dependencies().to_vec();
        let optional = record.optional_dependencies().to_vec();

        for dep in &dependencies {
            if ws.is_ignored(dep) {
                tracing::debug!("{}: not importing ignored dependency {}", name, dep);
                continue;
            }

            reverse.add_edge(dep, &name);
            if !ws.registry().contains(dep) {
                ws.add_exclusion(dep, format!("{} is not defined in this workspace", dep));
                propagate_exclusion(ws, dep, &reverse, selection, observer);
            } else if ws.is_excluded(dep) {
                propagate_exclusion(ws, dep, &reverse, selection, observer);
            } else if !processed.contains(dep) {
                queue.push(dep);
            }
        }

        for dep in &optional {
            if !ws.registry().contains(dep) {
                tracing::debug!("{}: skipping unknown optional dependency {}", name, dep);
            } else if !ws.is_excluded(dep) && !ws.is_ignored(dep) && !processed.contains(dep) {
                queue.push(dep);
            }
        }

        let total = observer.known_total(&processed, &queue);
        observer.queued(total);
    }

    let enabled = resolve_optional_dependencies(ws, selection);
    report_selection(selection, observer);
    Ok(enabled)
}

/// Import one package and read its manifest.
///
/// A failing importer excludes the package instead of returning an error.
/// Errors are reserved for configuration problems: an unknown package, or
/// a package without VCS that is not checked out.
pub fn import_single_package(ws: &mut Workspace, name: &str, opts: &ImportOptions) -> Result<()> {
    let Some(record) = ws.registry().find(name) else {
        return Err(FlotillaError::UnknownPackage {
            name: name.to_string(),
        }
        .into());
    };

    match record.importer() {
        None if !record.is_checked_out() => {
            return Err(FlotillaError::NotCheckedOut {
                name: name.to_string(),
                srcdir: record.srcdir().to_path_buf(),
            }
            .into());
        }
        None => {}
        Some(_) if opts.only_checkout && record.is_checked_out() => {
            tracing::debug!("{} is already checked out", name);
        }
        Some(importer) => {
            tracing::info!("importing {} ({})", name, importer.kind());
            if let Err(err) = importer.import(record, opts.only_local) {
                tracing::warn!("failed to import {}: {}", name, err);
                ws.add_exclusion(name, format!("failed to import: {}", err));
                return Ok(());
            }
        }
    }

    ws.load_package_manifest(name);
    if let Some(record) = ws.registry_mut().find_mut(name) {
        record.mark_imported();
    }
    Ok(())
}

/// Ordered, duplicate-free queue of package names.
#[derive(Debug, Default)]
struct ImportQueue {
    order: VecDeque<String>,
    pending: BTreeSet<String>,
}

impl ImportQueue {
    fn push(&mut self, name: &str) {
        if self.pending.insert(name.to_string()) {
            self.order.push_back(name.to_string());
        }
    }

    fn pop(&mut self) -> Option<String> {
        let name = self.order.pop_front()?;
        self.pending.remove(&name);
        Some(name)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, name: &str) -> bool {
        self.pending.contains(name)
    }
}

/// Forwards to an observer, reporting each package at most once.
///
/// A package excluded while queued, or excluded after it was imported, is
/// not reported a second time.
struct ReportOnce<'a> {
    inner: &'a mut dyn ImportObserver,
    reported: BTreeSet<String>,
}

impl<'a> ReportOnce<'a> {
    fn new(inner: &'a mut dyn ImportObserver) -> Self {
        ReportOnce {
            inner,
            reported: BTreeSet::new(),
        }
    }

    /// Packages processed, queued, or reported without ever being queued.
    fn known_total(&self, processed: &BTreeSet<String>, queue: &ImportQueue) -> usize {
        let unqueued = self
            .reported
            .iter()
            .filter(|name| !processed.contains(*name) && !queue.contains(name))
            .count();
        processed.len() + queue.len() + unqueued
    }
}

impl ImportObserver for ReportOnce<'_> {
    fn queued(&mut self, total: usize) {
        self.inner.queued(total);
    }

    fn importing(&mut self, name: &str) {
        self.inner.importing(name);
    }

    fn imported(&mut self, name: &str) {
        if self.reported.insert(name.to_string()) {
            self.inner.imported(name);
        }
    }

    fn excluded(&mut self, name: &str, reason: &str) {
        if self.reported.insert(name.to_string()) {
            self.inner.excluded(name, reason);
        }
    }

    fn warning(&mut self, diag: &Diagnostic) {
        self.inner.warning(diag);
    }
}

fn propagate_exclusion(
    ws: &mut Workspace,
    name: &str,
    reverse: &ReverseDependencies,
    selection: &mut PackageSelection,
    observer: &mut dyn ImportObserver,
) {
    for excluded in mark_excluded(ws.exclusions_mut(), name, reverse) {
        if let Some(reason) = ws.exclusion_reason(&excluded) {
            observer.excluded(&excluded, reason);
        }
    }

    for selector in selection.filter_excluded_and_ignored(ws) {
        observer.warning(
            &Diagnostic::warning(format!(
                "nothing selected by {} can be imported anymore",
                selector
            ))
            .with_suggestion(suggestions::EXCLUDED),
        );
    }
}

fn report_selection(selection: &PackageSelection, observer: &mut dyn ImportObserver) {
    for (selector, excluded) in selection.exclusions() {
        for (name, reason) in excluded {
            let message = if selector == name {
                format!("{} is selected, but it is excluded", name)
            } else {
                format!("{} was selected by {}, but it is excluded", name, selector)
            };
            observer.warning(&Diagnostic::warning(message).with_context(reason.clone()));
        }
    }

    for (selector, ignored) in selection.ignores() {
        for name in ignored {
            let message = if selector == name {
                format!("{} is selected, but it is ignored", name)
            } else {
                format!("{} was selected by {}, but it is ignored", name, selector)
            };
            observer.warning(&Diagnostic::warning(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::PackageRecord;
    use crate::test_support::{package_manifest, MockImporter, WorkspaceBuilder};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        warnings: Vec<String>,
        imported: Vec<String>,
        excluded: Vec<String>,
        total: usize,
    }

    impl ImportObserver for Recorder {
        fn queued(&mut self, total: usize) {
            self.total = total;
        }

        fn imported(&mut self, name: &str) {
            self.imported.push(name.to_string());
        }

        fn excluded(&mut self, name: &str, _reason: &str) {
            self.excluded.push(name.to_string());
        }

        fn warning(&mut self, diag: &Diagnostic) {
            self.warnings.push(diag.message.clone());
        }
    }

    fn select(names: &[&str]) -> PackageSelection {
        let mut selection = PackageSelection::new();
        for name in names {
            selection.select(name, [*name]);
        }
        selection
    }

    fn run(ws: &mut Workspace, names: &[&str]) -> (BTreeSet<String>, PackageSelection) {
        let mut selection = select(names);
        let enabled = import_packages(
            ws,
            &mut selection,
            &ImportOptions::default(),
            &mut SilentObserver,
        )
        .unwrap();
        (enabled, selection)
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dependencies_discovered_from_manifests() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new()
            .with_manifest("app", package_manifest(&["log"], &[]))
            .with_manifest("log", package_manifest(&["base"], &[]));
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
            .package("app", &[])
            .package("log", &[])
            .package("base", &[])
            .package("unused", &[])
            .build();

        let (enabled, _) = run(&mut ws, &["app"]);

        assert_eq!(enabled, set(&["app", "base", "log"]));
        assert_eq!(importer.calls(), ["app", "log", "base"]);
        assert!(ws.registry().find("base").unwrap().is_imported());
        assert!(!ws.registry().find("unused").unwrap().is_imported());
    }

    #[test]
    fn test_diamond_imports_shared_dependency_once() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new();
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
            .package("a", &["b", "c"])
            .package("b", &["d"])
            .package("c", &["d"])
            .package("d", &[])
            .build();

        let (enabled, _) = run(&mut ws, &["a"]);

        assert_eq!(enabled, set(&["a", "b", "c", "d"]));
        assert_eq!(importer.import_count("d"), 1);
        assert_eq!(importer.calls().len(), 4);
    }

    #[test]
    fn test_failed_dependency_excludes_dependent() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_failure("pkgB", "connection refused");
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("pkgA", &["pkgB"])
            .package("pkgB", &[])
            .build();

        let (enabled, selection) = run(&mut ws, &["pkgA"]);

        assert!(enabled.is_empty());
        assert!(selection.is_empty());
        assert_eq!(
            ws.exclusion_reason("pkgB"),
            Some("failed to import: connection refused")
        );
        let reason = ws.exclusion_reason("pkgA").unwrap();
        assert!(reason.contains("pkgB"), "{}", reason);
        assert!(selection.exclusions()["pkgA"].contains_key("pkgA"));
    }

    #[test]
    fn test_each_package_is_reported_once() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_failure("base", "connection refused");
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("app", &["log", "base"])
            .package("log", &["base"])
            .package("base", &[])
            .package("tool", &["ghost"])
            .build();

        let mut recorder = Recorder::default();
        let mut selection = select(&["app", "tool"]);
        import_packages(
            &mut ws,
            &mut selection,
            &ImportOptions::default(),
            &mut recorder,
        )
        .unwrap();

        // app and log were imported before base failed
        assert!(ws.is_excluded("app"));
        assert!(ws.is_excluded("log"));
        let mut reported: Vec<&String> =
            recorder.imported.iter().chain(&recorder.excluded).collect();
        let count = reported.len();
        reported.sort();
        reported.dedup();
        assert_eq!(reported.len(), count, "{:?}", reported);
        assert_eq!(recorder.excluded, ["base"]);
        assert!(recorder.total >= count);
    }

    #[test]
    fn test_exclusion_reaches_hard_ancestors_only() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_failure("gui", "no display library");
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("base", &[])
            .package("gui", &["base"])
            .package("viewer", &["gui"])
            .package("tool", &["viewer"])
            .package_with_optional("app", &["base"], &["gui"])
            .build();

        let mut recorder = Recorder::default();
        let mut selection = select(&["tool", "app"]);
        let enabled = import_packages(
            &mut ws,
            &mut selection,
            &ImportOptions::default(),
            &mut recorder,
        )
        .unwrap();

        assert!(ws.is_excluded("gui"));
        assert!(ws.is_excluded("viewer"));
        assert!(ws.is_excluded("tool"));
        assert!(!ws.is_excluded("app"));
        assert!(!ws.is_excluded("base"));
        assert_eq!(enabled, set(&["app", "base"]));
        assert!(ws
            .registry()
            .find("app")
            .unwrap()
            .enabled_optional_dependencies()
            .is_empty());

        let tool = ws.exclusions().get("tool").unwrap();
        assert_eq!(tool.chain(), ["gui", "viewer", "tool"]);
        assert_eq!(recorder.excluded, ["gui"]);
        assert!(recorder
            .warnings
            .iter()
            .any(|w| w == "tool is selected, but it is excluded"));
    }

    #[test]
    fn test_dependency_cycle_terminates() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new();
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
            .package("a", &["b"])
            .package("b", &["c"])
            .package("c", &["a"])
            .build();

        let (enabled, _) = run(&mut ws, &["a"]);

        assert_eq!(enabled, set(&["a", "b", "c"]));
        assert_eq!(importer.calls().len(), 3);
    }

    #[test]
    fn test_failure_inside_cycle_terminates() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new().with_failure("c", "gone");
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("a", &["b"])
            .package("b", &["c"])
            .package("c", &["a"])
            .build();

        let (enabled, _) = run(&mut ws, &["a"]);

        assert!(enabled.is_empty());
        assert!(ws.is_excluded("a"));
        assert!(ws.is_excluded("b"));
    }

    #[test]
    fn test_unknown_dependency_is_excluded() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new();
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("app", &["ghost"])
            .build();

        let (enabled, _) = run(&mut ws, &["app"]);

        assert!(enabled.is_empty());
        assert_eq!(
            ws.exclusion_reason("ghost"),
            Some("ghost is not defined in this workspace")
        );
        assert!(ws.exclusion_reason("app").unwrap().contains("ghost"));
    }

    #[test]
    fn test_manifest_can_exclude_package() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new()
            .with_manifest("legacy", "[package]\nexcluded = \"needs python 2\"\n");
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer)
            .package("legacy", &[])
            .package("app", &["legacy"])
            .build();

        let (enabled, _) = run(&mut ws, &["app"]);

        assert!(enabled.is_empty());
        assert_eq!(ws.exclusion_reason("legacy"), Some("needs python 2"));
        assert_eq!(
            ws.exclusion_reason("app"),
            Some("its dependency legacy is excluded: needs python 2")
        );
    }

    #[test]
    fn test_ignored_dependency_is_not_imported() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new();
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
            .package("app", &["system-lib"])
            .package("system-lib", &[])
            .build();
        ws.ignore("system-lib");

        let (enabled, _) = run(&mut ws, &["app"]);

        assert_eq!(importer.calls(), ["app"]);
        assert!(enabled.contains("app"));
        assert!(!ws.is_excluded("app"));
    }

    #[test]
    fn test_optional_dependencies_are_imported_without_edges() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new();
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
            .package_with_optional("app", &[], &["plugins"])
            .package("plugins", &[])
            .build();

        let (enabled, _) = run(&mut ws, &["app"]);

        assert_eq!(importer.calls(), ["app", "plugins"]);
        assert_eq!(enabled, set(&["app", "plugins"]));
        assert_eq!(
            ws.registry().find("app").unwrap().enabled_optional_dependencies(),
            ["plugins"]
        );
    }

    #[test]
    fn test_only_local_import_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new()
            .with_manifest("app", package_manifest(&["base"], &[]))
            .with_failure("broken", "unreachable");
        let build = || {
            WorkspaceBuilder::new(tmp.path(), importer.clone())
                .package("app", &["broken"])
                .package("base", &[])
                .package("broken", &[])
                .package("tool", &["base"])
                .build()
        };
        let opts = ImportOptions {
            only_local: true,
            only_checkout: false,
        };

        let mut first = build();
        let mut selection = select(&["app", "tool"]);
        let enabled_first =
            import_packages(&mut first, &mut selection, &opts, &mut SilentObserver).unwrap();

        let mut second = build();
        let mut selection = select(&["app", "tool"]);
        let enabled_second =
            import_packages(&mut second, &mut selection, &opts, &mut SilentObserver).unwrap();

        assert_eq!(enabled_first, enabled_second);
        let reasons = |ws: &Workspace| {
            ws.exclusions()
                .iter()
                .map(|e| (e.name().to_string(), e.reason().to_string()))
                .collect::<Vec<_>>()
        };
        assert_eq!(reasons(&first), reasons(&second));
        assert!(importer.calls_with_flags().iter().all(|(_, local)| *local));
    }

    #[test]
    fn test_only_checkout_skips_existing_checkouts() {
        let tmp = TempDir::new().unwrap();
        let importer = MockImporter::new();
        std::fs::create_dir_all(tmp.path().join("base")).unwrap();
        let mut ws = WorkspaceBuilder::new(tmp.path(), importer.clone())
            .package("app", &["base"])
            .package("base", &[])
            .build();

        let mut selection = select(&["app"]);
        let opts = ImportOptions {
            only_local: false,
            only_checkout: true,
        };
        import_packages(&mut ws, &mut selection, &opts, &mut SilentObserver).unwrap();

        assert_eq!(importer.calls(), ["app"]);
        assert!(ws.registry().find("base").unwrap().is_imported());
    }

    #[test]
    fn test_local_package_must_exist() {
        let tmp = TempDir::new().unwrap();
        let mut ws = WorkspaceBuilder::new(tmp.path(), MockImporter::new())
            .record(PackageRecord::new("app", tmp.path().join("missing")))
            .build();

        let err = import_single_package(&mut ws, "app", &ImportOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlotillaError>(),
            Some(FlotillaError::NotCheckedOut { .. })
        ));
    }

    #[test]
    fn test_unknown_selected_package_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut ws = WorkspaceBuilder::new(tmp.path(), MockImporter::new()).build();
        let mut selection = select(&["ghost"]);

        let err = import_packages(
            &mut ws,
            &mut selection,
            &ImportOptions::default(),
            &mut SilentObserver,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
