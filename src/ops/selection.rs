//! Selection resolution.
//!
//! Turns the raw selectors given on the command line into a
//! [`PackageSelection`]. A selector can name a package, a package set, a
//! metapackage or a directory.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;

use crate::core::errors::FlotillaError;
use crate::core::selection::PackageSelection;
use crate::core::workspace::Workspace;
use crate::sources::{AutoAddHandler, BuildSystemDetector};

/// Options for selection resolution.
#[derive(Debug, Clone)]
pub struct SelectionOptions {
    /// Also select packages whose directory contains a path selector
    pub select_all_matches: bool,

    /// Drop excluded and ignored packages, and auto-add unknown directories
    pub filter: bool,

    /// Directory relative path selectors are resolved against
    pub base_dir: PathBuf,
}

impl SelectionOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        SelectionOptions {
            select_all_matches: false,
            filter: true,
            base_dir: base_dir.into(),
        }
    }
}

impl Default for SelectionOptions {
    fn default() -> Self {
        SelectionOptions::new(std::env::current_dir().unwrap_or_default())
    }
}

/// Resolve `selectors` with the build-system detector as auto-add handler.
pub fn resolve_selection(
    ws: &mut Workspace,
    selectors: &[String],
    opts: &SelectionOptions,
) -> Result<PackageSelection> {
    let detector = BuildSystemDetector::new(ws.root());
    resolve_selection_with(ws, selectors, opts, Some(&detector))
}

/// Resolve `selectors` into a package selection.
///
/// An empty selector list stands for the workspace's default selection.
/// Selectors matching nothing are kept in the selection so that
/// [`validate_selection`] can report them.
pub fn resolve_selection_with(
    ws: &mut Workspace,
    selectors: &[String],
    opts: &SelectionOptions,
    auto_add: Option<&dyn AutoAddHandler>,
) -> Result<PackageSelection> {
    let selectors = if selectors.is_empty() {
        ws.default_selectors()
    } else {
        selectors.to_vec()
    };

    let mut selection = PackageSelection::new();
    let mut unresolved = Vec::new();

    for selector in &selectors {
        let matches = expand_selector(ws, selector, opts);
        if matches.is_empty() {
            selection.record_selector(selector);
            unresolved.push(selector.clone());
        } else {
            tracing::debug!(
                "{} selects {}",
                selector,
                matches.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            selection.select(selector, matches);
        }
    }

    if opts.filter {
        if let Some(handler) = auto_add {
            for selector in unresolved {
                if let Some(name) = auto_add_package(ws, handler, &selector, opts) {
                    selection.select(&selector, [name]);
                }
            }
        }

        for selector in selection.filter_excluded_and_ignored(ws) {
            tracing::debug!("everything selected by {} is excluded or ignored", selector);
        }
    }

    Ok(selection)
}

/// Fail if any selector did not match a package.
///
/// Validation runs against the selectors that were resolved, so an empty
/// list checks the default selection recorded in `selection`.
pub fn validate_selection(
    selectors: &[String],
    selection: &PackageSelection,
) -> Result<(), FlotillaError> {
    let mut unmatched: Vec<String> = if selectors.is_empty() {
        selection
            .selectors()
            .filter(|s| !selection.has_match_for(s))
            .map(str::to_string)
            .collect()
    } else {
        selectors
            .iter()
            .filter(|s| !selection.has_match_for(s))
            .cloned()
            .collect()
    };

    if unmatched.is_empty() {
        return Ok(());
    }

    unmatched.sort();
    unmatched.dedup();
    Err(FlotillaError::SelectionMismatch {
        selectors: unmatched,
    })
}

fn expand_selector(ws: &Workspace, selector: &str, opts: &SelectionOptions) -> BTreeSet<String> {
    let registry = ws.registry();

    if registry.contains(selector) {
        return BTreeSet::from([selector.to_string()]);
    }
    if let Some(set) = registry.package_set(selector) {
        return set.packages().iter().cloned().collect();
    }
    if registry.metapackage(selector).is_some() {
        let mut visited = BTreeSet::new();
        let mut names = BTreeSet::new();
        expand_metapackage(ws, selector, &mut visited, &mut names);
        return names;
    }

    let path = normalize_path(&opts.base_dir.join(selector));
    match_path(ws, &path, opts.select_all_matches)
}

fn expand_metapackage(
    ws: &Workspace,
    name: &str,
    visited: &mut BTreeSet<String>,
    names: &mut BTreeSet<String>,
) {
    if !visited.insert(name.to_string()) {
        return;
    }

    let registry = ws.registry();
    let Some(meta) = registry.metapackage(name) else {
        return;
    };

    for member in meta.includes() {
        if registry.contains(member) {
            names.insert(member.clone());
        } else if let Some(set) = registry.package_set(member) {
            names.extend(set.packages().iter().cloned());
        } else if registry.metapackage(member).is_some() {
            expand_metapackage(ws, member, visited, names);
        } else {
            tracing::warn!(
                "metapackage {} includes {}, which is not defined in this workspace",
                name,
                member
            );
        }
    }
}

/// Packages selected by a directory.
///
/// Every package below `path` is selected. When there is none, the package
/// owning `path` is, found by walking upward. Walking upward only happens
/// for existing directories so that a mistyped name never selects the
/// package the user happens to stand in.
fn match_path(ws: &Workspace, path: &Path, select_all_matches: bool) -> BTreeSet<String> {
    let registry = ws.registry();

    let mut names: BTreeSet<String> = registry
        .packages()
        .filter(|p| p.srcdir().starts_with(path))
        .map(|p| p.name().to_string())
        .collect();

    if !path.is_dir() {
        return names;
    }

    if select_all_matches {
        names.extend(
            registry
                .packages()
                .filter(|p| path.starts_with(p.srcdir()))
                .map(|p| p.name().to_string()),
        );
    } else if names.is_empty() {
        let mut current = path.to_path_buf();
        while current.pop() {
            if let Some(owner) = registry.owner_of(&current) {
                names.insert(owner.name().to_string());
                break;
            }
        }
    }

    names
}

fn auto_add_package(
    ws: &mut Workspace,
    handler: &dyn AutoAddHandler,
    selector: &str,
    opts: &SelectionOptions,
) -> Option<String> {
    let path = normalize_path(&opts.base_dir.join(selector));
    if !path.is_dir() {
        return None;
    }

    let (kind, owner) = handler.detect(&path)?;
    let Some(relative) = pathdiff::diff_paths(&owner, ws.root()) else {
        tracing::warn!(
            "cannot auto-add {}: not inside the workspace",
            owner.display()
        );
        return None;
    };

    match handler.create(kind, &relative) {
        Ok(record) => {
            let name = record.name().to_string();
            tracing::info!("auto-added {} as a {} package", name, kind);
            ws.registry_mut().register(record);
            Some(name)
        }
        Err(err) => {
            tracing::warn!("failed to auto-add {}: {:#}", relative.display(), err);
            None
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::PackageRecord;
    use crate::test_support::{MockImporter, WorkspaceBuilder};
    use tempfile::TempDir;

    fn selectors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn robots(root: &Path) -> Workspace {
        WorkspaceBuilder::new(root, MockImporter::new())
            .local_package("base", &[])
            .local_package("drivers/camera", &["base"])
            .local_package("drivers/lidar", &["base"])
            .local_package("app", &["drivers/camera"])
            .package_set("drivers", &["drivers/camera", "drivers/lidar"])
            .metapackage("sensors", &["drivers", "everything"])
            .metapackage("everything", &["sensors", "app"])
            .layout(&["base", "app"])
            .build()
    }

    fn names(selection: &PackageSelection) -> Vec<&str> {
        selection.packages().collect()
    }

    #[test]
    fn test_empty_selectors_use_layout() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());

        let selection =
            resolve_selection(&mut ws, &[], &SelectionOptions::new(tmp.path())).unwrap();

        assert_eq!(names(&selection), ["app", "base"]);
        assert_eq!(selection.selectors().collect::<Vec<_>>(), ["app", "base"]);
    }

    #[test]
    fn test_sets_and_recursive_metapackages() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["everything"]),
            &SelectionOptions::new(tmp.path()),
        )
        .unwrap();

        assert_eq!(
            names(&selection),
            ["app", "drivers/camera", "drivers/lidar"]
        );
        assert_eq!(
            selection.selectors_for("drivers/lidar").collect::<Vec<_>>(),
            ["everything"]
        );
    }

    #[test]
    fn test_path_selects_packages_below() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["drivers"]),
            &SelectionOptions::new(tmp.path()),
        )
        .unwrap();
        // "drivers" is a package set name, which wins over the directory
        assert_eq!(names(&selection), ["drivers/camera", "drivers/lidar"]);

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["."]),
            &SelectionOptions::new(tmp.path().join("drivers")),
        )
        .unwrap();
        assert_eq!(names(&selection), ["drivers/camera", "drivers/lidar"]);
    }

    #[test]
    fn test_path_walks_up_to_owner() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());
        let nested = tmp.path().join("app").join("src").join("gui");
        std::fs::create_dir_all(&nested).unwrap();

        let selection =
            resolve_selection(&mut ws, &selectors(&["."]), &SelectionOptions::new(&nested))
                .unwrap();

        assert_eq!(names(&selection), ["app"]);
    }

    #[test]
    fn test_select_all_matches_includes_ancestors() {
        let tmp = TempDir::new().unwrap();
        let mut ws = WorkspaceBuilder::new(tmp.path(), MockImporter::new())
            .local_package("tools", &[])
            .local_package("tools/logger", &[])
            .build();
        let mut opts = SelectionOptions::new(tmp.path());
        opts.select_all_matches = true;

        let selection =
            resolve_selection(&mut ws, &selectors(&["tools/logger"]), &opts).unwrap();

        // the name matches first, path matching is not consulted
        assert_eq!(names(&selection), ["tools/logger"]);

        let selection =
            resolve_selection(&mut ws, &selectors(&["./tools/logger/"]), &opts).unwrap();
        assert_eq!(names(&selection), ["tools", "tools/logger"]);
    }

    #[test]
    fn test_unknown_name_does_not_select_current_package() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["ghost"]),
            &SelectionOptions::new(tmp.path().join("app")),
        )
        .unwrap();

        assert!(selection.is_empty());
        assert!(!selection.has_match_for("ghost"));
    }

    #[test]
    fn test_filter_removes_excluded_and_ignored() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());
        ws.add_exclusion("drivers/lidar", "broken driver");
        ws.ignore("base");

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["drivers", "base"]),
            &SelectionOptions::new(tmp.path()),
        )
        .unwrap();

        assert_eq!(names(&selection), ["drivers/camera"]);
        assert_eq!(
            selection.exclusions()["drivers"]["drivers/lidar"],
            "broken driver"
        );
        assert!(selection.ignores()["base"].contains("base"));
        // filtered selectors still count as matched
        assert!(validate_selection(&selectors(&["drivers", "base"]), &selection).is_ok());
    }

    #[test]
    fn test_no_filter_keeps_excluded() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());
        ws.add_exclusion("base", "broken");
        let mut opts = SelectionOptions::new(tmp.path());
        opts.filter = false;

        let selection = resolve_selection(&mut ws, &selectors(&["base"]), &opts).unwrap();
        assert_eq!(names(&selection), ["base"]);
    }

    #[test]
    fn test_auto_add_unknown_directory() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());
        let logger = tmp.path().join("tools").join("logger");
        std::fs::create_dir_all(logger.join("src")).unwrap();
        std::fs::write(logger.join("Cargo.toml"), "").unwrap();

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["tools/logger/src"]),
            &SelectionOptions::new(tmp.path()),
        )
        .unwrap();

        assert_eq!(names(&selection), ["tools/logger"]);
        let record = ws.registry().find("tools/logger").unwrap();
        assert_eq!(record.srcdir(), logger);
        assert!(record.importer().is_none());
    }

    #[test]
    fn test_auto_add_failure_leaves_selector_unresolved() {
        #[derive(Debug)]
        struct Failing;

        impl AutoAddHandler for Failing {
            fn detect(&self, path: &Path) -> Option<(crate::sources::HandlerKind, PathBuf)> {
                Some((crate::sources::HandlerKind::Make, path.to_path_buf()))
            }

            fn create(
                &self,
                _kind: crate::sources::HandlerKind,
                relative_path: &Path,
            ) -> Result<PackageRecord> {
                anyhow::bail!("cannot handle {}", relative_path.display())
            }
        }

        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();

        let selection = resolve_selection_with(
            &mut ws,
            &selectors(&["docs"]),
            &SelectionOptions::new(tmp.path()),
            Some(&Failing),
        )
        .unwrap();

        assert!(selection.is_empty());
        assert!(validate_selection(&selectors(&["docs"]), &selection).is_err());
    }

    #[test]
    fn test_validate_names_all_unmatched_sorted() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());
        let requested = selectors(&["foo", "base", "bar"]);

        let selection =
            resolve_selection(&mut ws, &requested, &SelectionOptions::new(tmp.path())).unwrap();
        let err = validate_selection(&requested, &selection).unwrap_err();

        assert_eq!(
            err.to_string(),
            "wrong package selection, cannot find a match for bar, foo"
        );
    }

    #[test]
    fn test_every_selected_name_is_registered() {
        let tmp = TempDir::new().unwrap();
        let mut ws = robots(tmp.path());

        let selection = resolve_selection(
            &mut ws,
            &selectors(&["sensors", ".", "app"]),
            &SelectionOptions::new(tmp.path()),
        )
        .unwrap();

        assert!(!selection.is_empty());
        for name in selection.packages() {
            assert!(ws.registry().contains(name), "{} is not registered", name);
        }
        for selector in ["sensors", ".", "app"] {
            for name in selection.matches_for(selector) {
                assert!(selection.selectors_for(name).any(|s| s == selector));
            }
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/ws/app/../base/./src")),
            PathBuf::from("/ws/base/src")
        );
    }
}
