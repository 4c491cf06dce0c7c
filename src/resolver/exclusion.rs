//! Exclusion propagation.
//!
//! A package that cannot be built takes down every package that depends on
//! it through hard dependencies. The reverse-dependency graph is discovered
//! while packages are imported, so propagation only ever sees the edges known
//! so far; the import engine calls it again whenever a new edge leads to an
//! already excluded package.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::workspace::Exclusions;

/// Package -> packages that directly depend on it through hard dependencies.
#[derive(Debug, Clone, Default)]
pub struct ReverseDependencies {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ReverseDependencies {
    pub fn new() -> Self {
        ReverseDependencies::default()
    }

    /// Record that `dependent` has a hard dependency on `dependency`.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) {
        self.edges
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Direct dependents of `name`, sorted.
    pub fn dependents(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

/// Propagate the exclusion of `name` to its known transitive dependents.
///
/// `name` must already carry its exclusion; its reason is inherited by every
/// dependent. Dependents that are already excluded stop the walk, so cycles
/// and diamonds are visited once. Returns the newly excluded names in
/// visiting order.
pub fn mark_excluded(
    exclusions: &mut Exclusions,
    name: &str,
    reverse: &ReverseDependencies,
) -> Vec<String> {
    let Some(reason) = exclusions.reason(name).map(str::to_string) else {
        tracing::debug!("{} is not excluded, nothing to propagate", name);
        return Vec::new();
    };

    let mut newly_excluded = Vec::new();
    let mut stack: Vec<Vec<String>> = vec![vec![name.to_string()]];

    while let Some(chain) = stack.pop() {
        let Some(current) = chain.last() else {
            continue;
        };

        let dependents: Vec<&str> = reverse
            .dependents(current)
            .filter(|dep| !exclusions.is_excluded(dep))
            .collect();

        // Reversed so dependents are visited in sorted order.
        for dependent in dependents.into_iter().rev() {
            let mut dependent_chain = chain.clone();
            dependent_chain.push(dependent.to_string());
            stack.push(dependent_chain);
        }

        if chain.len() == 1 {
            continue;
        }

        let message = propagated_reason(&chain, &reason);
        if exclusions.add(current, message, chain.clone()) {
            newly_excluded.push(current.clone());
        }
    }

    newly_excluded
}

/// Reason given to a package excluded because of its dependencies.
fn propagated_reason(chain: &[String], reason: &str) -> String {
    let root = &chain[0];
    if chain.len() == 2 {
        format!("its dependency {} is excluded: {}", root, reason)
    } else {
        format!(
            "{} is excluded: {} (dependency chain: {})",
            root,
            reason,
            chain.join(">")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverse(edges: &[(&str, &str)]) -> ReverseDependencies {
        let mut reverse = ReverseDependencies::new();
        for (dependency, dependent) in edges {
            reverse.add_edge(dependency, dependent);
        }
        reverse
    }

    #[test]
    fn test_propagates_to_transitive_dependents() {
        // app -> gui -> base, tool -> base
        let reverse = reverse(&[("base", "gui"), ("gui", "app"), ("base", "tool")]);
        let mut exclusions = Exclusions::new();
        exclusions.add("base", "failed to import: network down", Vec::new());

        let excluded = mark_excluded(&mut exclusions, "base", &reverse);

        assert_eq!(excluded, ["gui", "app", "tool"]);
        assert_eq!(
            exclusions.reason("gui"),
            Some("its dependency base is excluded: failed to import: network down")
        );
        assert_eq!(
            exclusions.reason("app"),
            Some("base is excluded: failed to import: network down (dependency chain: base>gui>app)")
        );
        assert_eq!(exclusions.get("app").unwrap().chain(), ["base", "gui", "app"]);
    }

    #[test]
    fn test_unrelated_packages_are_untouched() {
        let reverse = reverse(&[("base", "gui"), ("log", "tool")]);
        let mut exclusions = Exclusions::new();
        exclusions.add("base", "broken", Vec::new());

        mark_excluded(&mut exclusions, "base", &reverse);

        assert!(exclusions.is_excluded("gui"));
        assert!(!exclusions.is_excluded("tool"));
        assert!(!exclusions.is_excluded("log"));
    }

    #[test]
    fn test_cycle_terminates() {
        let reverse = reverse(&[("a", "b"), ("b", "a")]);
        let mut exclusions = Exclusions::new();
        exclusions.add("a", "broken", Vec::new());

        let excluded = mark_excluded(&mut exclusions, "a", &reverse);

        assert_eq!(excluded, ["b"]);
        assert_eq!(exclusions.reason("a"), Some("broken"));
    }

    #[test]
    fn test_diamond_keeps_first_chain() {
        // top -> left -> bottom, top -> right -> bottom
        let reverse = reverse(&[
            ("bottom", "left"),
            ("bottom", "right"),
            ("left", "top"),
            ("right", "top"),
        ]);
        let mut exclusions = Exclusions::new();
        exclusions.add("bottom", "broken", Vec::new());

        let excluded = mark_excluded(&mut exclusions, "bottom", &reverse);

        assert_eq!(excluded, ["left", "top", "right"]);
        assert_eq!(exclusions.get("top").unwrap().chain(), ["bottom", "left", "top"]);
    }

    #[test]
    fn test_existing_exclusion_is_not_overwritten() {
        let reverse = reverse(&[("base", "gui")]);
        let mut exclusions = Exclusions::new();
        exclusions.add("base", "broken", Vec::new());
        exclusions.add("gui", "needs a display", Vec::new());

        assert!(mark_excluded(&mut exclusions, "base", &reverse).is_empty());
        assert_eq!(exclusions.reason("gui"), Some("needs a display"));
    }

    #[test]
    fn test_not_excluded_root_is_a_noop() {
        let reverse = reverse(&[("base", "gui")]);
        let mut exclusions = Exclusions::new();

        assert!(mark_excluded(&mut exclusions, "base", &reverse).is_empty());
        assert!(exclusions.is_empty());
    }
}
