//! Implementation of `flotilla show`.
//!
//! Displays what the workspace knows about packages: where they come from,
//! why they are (or are not) part of the default selection, and how they
//! relate to the rest of the workspace.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;

use anyhow::Result;

use crate::core::errors::FlotillaError;
use crate::core::selection::PackageSelection;
use crate::core::workspace::Workspace;
use crate::ops::selection::{resolve_selection_with, SelectionOptions};

/// How a package relates to the default selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultSelection {
    /// Listed by name in the layout
    Direct,
    /// Selected by these layout entries
    Via(Vec<String>),
    NotSelected,
}

/// Everything `show` prints about one package.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub name: String,
    pub vcs: Vec<(&'static str, String)>,
    pub default_selection: DefaultSelection,
    pub ignored: bool,
    pub exclusion: Option<String>,
    pub checked_out: bool,
    pub reverse_dependencies: Vec<String>,
    /// Paths from layout entries to the package, following dependencies
    pub selection_paths: Vec<Vec<String>>,
    pub dependencies: Vec<String>,
    pub enabled_optional: Vec<String>,
    pub disabled_optional: Vec<String>,
}

impl PackageInfo {
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        let title = format!("source package {}", self.name);
        if color {
            out.push_str(&format!("\x1b[1m{}\x1b[0m\n", title));
        } else {
            out.push_str(&format!("{}\n", title));
        }

        out.push_str("  source definition\n");
        for (key, value) in &self.vcs {
            out.push_str(&format!("    {}: {}\n", key, value));
        }

        match &self.default_selection {
            DefaultSelection::Direct => {
                out.push_str("  is directly selected by the workspace layout\n")
            }
            DefaultSelection::Via(selectors) => out.push_str(&format!(
                "  is directly selected by the workspace layout via {}\n",
                selectors.join(", ")
            )),
            DefaultSelection::NotSelected => {
                out.push_str("  is not directly selected by the workspace layout\n")
            }
        }
        if self.ignored {
            out.push_str("  is ignored\n");
        }
        if let Some(reason) = &self.exclusion {
            out.push_str(&format!("  is excluded: {}\n", reason));
        }
        if !self.checked_out {
            let warning = "  this package is not checked out yet, the dependency information will probably be incomplete";
            if color {
                out.push_str(&format!("\x1b[35m{}\x1b[0m\n", warning));
            } else {
                out.push_str(&format!("{}\n", warning));
            }
        }

        if self.reverse_dependencies.is_empty() {
            out.push_str("  no reverse dependencies\n");
        } else {
            out.push_str(&format!(
                "  reverse dependencies: {}\n",
                self.reverse_dependencies.join(", ")
            ));
        }

        if !self.selection_paths.is_empty() {
            out.push_str("  selected by way of\n");
            for path in &self.selection_paths {
                out.push_str(&format!("    {}\n", path.join(">")));
            }
        }

        out.push_str(&format!(
            "  directly depends on: {}\n",
            self.dependencies.join(", ")
        ));
        if !self.enabled_optional.is_empty() {
            out.push_str(&format!(
                "  enabled optional dependencies: {}\n",
                self.enabled_optional.join(", ")
            ));
        }
        if !self.disabled_optional.is_empty() {
            out.push_str(&format!(
                "  disabled optional dependencies: {}\n",
                self.disabled_optional.join(", ")
            ));
        }
        out
    }
}

/// Collect information about the packages matching `selectors`.
///
/// Selection uses every possible match and does not filter excluded or
/// ignored packages, since those are what users usually want to inspect.
pub fn show(
    ws: &mut Workspace,
    selectors: &[String],
    base_dir: impl Into<PathBuf>,
) -> Result<Vec<PackageInfo>> {
    let opts = SelectionOptions {
        select_all_matches: true,
        filter: false,
        base_dir: base_dir.into(),
    };

    // Manifests of checked out packages complete the dependency information.
    let checked_out: Vec<String> = ws
        .registry()
        .packages()
        .filter(|p| p.is_checked_out())
        .map(|p| p.name().to_string())
        .collect();
    for name in &checked_out {
        ws.load_package_manifest(name);
    }

    let selection = resolve_selection_with(ws, selectors, &opts, None)?;
    if selection.is_empty() {
        return Err(FlotillaError::NothingToShow {
            selectors: selectors.to_vec(),
        }
        .into());
    }

    let defaults = resolve_selection_with(ws, &[], &opts, None)?;
    let revdeps = reverse_dependencies(ws);

    Ok(selection
        .packages()
        .filter_map(|name| package_info(ws, &defaults, &revdeps, name))
        .collect())
}

/// Direct reverse dependencies of every package.
fn reverse_dependencies(ws: &Workspace) -> BTreeMap<String, BTreeSet<String>> {
    let mut revdeps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in ws.registry().packages() {
        for dep in record.effective_dependencies() {
            revdeps
                .entry(dep.to_string())
                .or_default()
                .insert(record.name().to_string());
        }
    }
    revdeps
}

fn package_info(
    ws: &Workspace,
    defaults: &PackageSelection,
    revdeps: &BTreeMap<String, BTreeSet<String>>,
    name: &str,
) -> Option<PackageInfo> {
    let record = ws.registry().find(name)?;

    let default_selection = if defaults.contains(name) {
        let via: Vec<String> = defaults
            .selectors_for(name)
            .filter(|s| *s != name)
            .map(str::to_string)
            .collect();
        if defaults.selectors_for(name).any(|s| s == name) && via.is_empty() {
            DefaultSelection::Direct
        } else {
            DefaultSelection::Via(via)
        }
    } else {
        DefaultSelection::NotSelected
    };

    let mut all_revdeps = BTreeSet::new();
    let mut pending: VecDeque<&str> = revdeps
        .get(name)
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    while let Some(parent) = pending.pop_front() {
        if !all_revdeps.insert(parent.to_string()) {
            continue;
        }
        pending.extend(revdeps.get(parent).into_iter().flatten().map(String::as_str));
    }

    let mut roots = BTreeSet::new();
    for parent in &all_revdeps {
        if defaults.contains(parent) {
            roots.extend(defaults.selectors_for(parent).map(str::to_string));
        }
    }
    let selection_paths = roots
        .iter()
        .filter_map(|root| selection_path(ws, defaults, root, name))
        .collect();

    let mut dependencies = record.dependencies().to_vec();
    dependencies.sort();

    Some(PackageInfo {
        name: name.to_string(),
        vcs: record.vcs().to_pairs(),
        default_selection,
        ignored: ws.is_ignored(name),
        exclusion: ws.exclusion_reason(name).map(str::to_string),
        checked_out: record.is_checked_out(),
        reverse_dependencies: all_revdeps.into_iter().collect(),
        selection_paths,
        dependencies,
        enabled_optional: record.enabled_optional_dependencies().to_vec(),
        disabled_optional: record
            .disabled_optional_dependencies()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

/// Path from the layout entry `root` to `target` through dependencies.
fn selection_path(
    ws: &Workspace,
    defaults: &PackageSelection,
    root: &str,
    target: &str,
) -> Option<Vec<String>> {
    for member in defaults.matches_for(root) {
        let mut visited = BTreeSet::new();
        if let Some(mut path) = dependency_path(ws, member, target, &mut visited) {
            if member != root {
                path.insert(0, root.to_string());
            }
            return Some(path);
        }
    }
    None
}

fn dependency_path(
    ws: &Workspace,
    from: &str,
    to: &str,
    visited: &mut BTreeSet<String>,
) -> Option<Vec<String>> {
    if from == to {
        return Some(vec![from.to_string()]);
    }
    if !visited.insert(from.to_string()) {
        return None;
    }

    let record = ws.registry().find(from)?;
    for dep in record.effective_dependencies() {
        if let Some(mut path) = dependency_path(ws, dep, to, visited) {
            path.insert(0, from.to_string());
            return Some(path);
        }
    }
    None
}
