//! Optional dependency resolution.
//!
//! Runs once all hard dependencies have been imported. Starting from the
//! resolved selection, each package enables the optional dependencies that
//! are available in the workspace, and the walk continues through the
//! effective dependencies until nothing new is reached.

use std::collections::{BTreeSet, VecDeque};

use crate::core::selection::PackageSelection;
use crate::core::workspace::Workspace;

/// Check if an optional dependency can be enabled.
fn is_available(ws: &Workspace, name: &str) -> bool {
    ws.registry().contains(name) && !ws.is_excluded(name) && !ws.is_ignored(name)
}

/// Decide the enabled optional dependencies of every reachable package.
///
/// Returns every package reached from the selection, which is the set of
/// packages enabled for this run.
pub fn resolve_optional_dependencies(
    ws: &mut Workspace,
    selection: &PackageSelection,
) -> BTreeSet<String> {
    let mut queue: VecDeque<String> = selection.packages().map(str::to_string).collect();
    let mut visited = BTreeSet::new();
    let mut skipped = BTreeSet::new();

    while let Some(name) = queue.pop_front() {
        if visited.contains(&name) || skipped.contains(&name) {
            continue;
        }

        if let Some(reason) = ws.exclusion_reason(&name) {
            tracing::warn!("{} is required but excluded: {}", name, reason);
            skipped.insert(name);
            continue;
        }

        let Some(record) = ws.registry().find(&name) else {
            tracing::warn!("{} is required but not defined in this workspace", name);
            skipped.insert(name);
            continue;
        };

        for dep in record.dependencies() {
            if ws.is_excluded(dep) {
                tracing::warn!(
                    "{} is enabled although its dependency {} is excluded",
                    name,
                    dep
                );
            }
        }

        let available: Vec<String> = record
            .optional_dependencies()
            .iter()
            .filter(|dep| is_available(ws, dep))
            .cloned()
            .collect();
        let ignored = ws.is_ignored(&name);

        let Some(record) = ws.registry_mut().find_mut(&name) else {
            continue;
        };
        let enabled = record.resolve_optional_dependencies(|dep| available.iter().any(|a| a == dep));
        if !enabled.is_empty() {
            tracing::debug!("{}: enabled optional dependencies {}", name, enabled.join(", "));
        }
        if !ignored && !record.is_disabled() {
            record.prepare();
        }

        queue.extend(
            record
                .effective_dependencies()
                .filter(|dep| !visited.contains(*dep))
                .map(str::to_string),
        );
        visited.insert(name);
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::PackageRecord;

    fn workspace(records: Vec<PackageRecord>) -> Workspace {
        let mut ws = Workspace::new("/ws");
        for record in records {
            ws.registry_mut().register(record);
        }
        ws
    }

    fn select(names: &[&str]) -> PackageSelection {
        let mut selection = PackageSelection::new();
        for name in names {
            selection.select(name, [*name]);
        }
        selection
    }

    #[test]
    fn test_enables_available_optional_dependencies() {
        let mut ws = workspace(vec![
            PackageRecord::new("app", "/ws/app")
                .with_dependencies(["base"])
                .with_optional_dependencies(["gui", "python", "undefined"]),
            PackageRecord::new("base", "/ws/base"),
            PackageRecord::new("gui", "/ws/gui").with_dependencies(["qt"]),
            PackageRecord::new("qt", "/ws/qt"),
            PackageRecord::new("python", "/ws/python"),
        ]);
        ws.add_exclusion("python", "no interpreter");

        let enabled = resolve_optional_dependencies(&mut ws, &select(&["app"]));

        assert_eq!(
            enabled.iter().map(String::as_str).collect::<Vec<_>>(),
            ["app", "base", "gui", "qt"]
        );
        let app = ws.registry().find("app").unwrap();
        assert_eq!(app.enabled_optional_dependencies(), ["gui"]);
        assert!(app.is_prepared());
        assert!(ws.registry().find("qt").unwrap().is_prepared());
    }

    #[test]
    fn test_ignored_packages_are_not_prepared() {
        let mut ws = workspace(vec![
            PackageRecord::new("app", "/ws/app").with_dependencies(["vendored"]),
            PackageRecord::new("vendored", "/ws/vendored"),
        ]);
        ws.ignore("vendored");

        let enabled = resolve_optional_dependencies(&mut ws, &select(&["app"]));

        assert!(enabled.contains("vendored"));
        assert!(!ws.registry().find("vendored").unwrap().is_prepared());
    }

    #[test]
    fn test_cycles_terminate() {
        let mut ws = workspace(vec![
            PackageRecord::new("a", "/ws/a").with_dependencies(["b"]),
            PackageRecord::new("b", "/ws/b").with_optional_dependencies(["a"]),
        ]);

        let enabled = resolve_optional_dependencies(&mut ws, &select(&["a"]));

        assert_eq!(enabled.len(), 2);
        assert_eq!(
            ws.registry().find("b").unwrap().enabled_optional_dependencies(),
            ["a"]
        );
    }

    #[test]
    fn test_excluded_packages_are_skipped() {
        let mut ws = workspace(vec![PackageRecord::new("a", "/ws/a")]);
        ws.add_exclusion("a", "broken");

        assert!(resolve_optional_dependencies(&mut ws, &select(&["a"])).is_empty());
    }
}
