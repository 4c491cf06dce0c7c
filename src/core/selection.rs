//! PackageSelection - the packages a command works on, and why.
//!
//! Each resolved package remembers the selectors that picked it, and each
//! selector the packages it matched. When packages end up excluded or
//! ignored, the selection records that per selector so the user can be told
//! which part of their request could not be honoured.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::workspace::Workspace;

/// Resolved packages with their originating selectors.
#[derive(Debug, Clone, Default)]
pub struct PackageSelection {
    /// Resolved names, excluded and ignored ones removed by the filter
    packages: BTreeSet<String>,

    /// Package -> selectors
    selection: BTreeMap<String, BTreeSet<String>>,

    /// Selector -> packages, as matched before filtering
    matches: BTreeMap<String, BTreeSet<String>>,

    /// Selector -> excluded package -> reason
    exclusions: BTreeMap<String, BTreeMap<String, String>>,

    /// Selector -> ignored packages
    ignores: BTreeMap<String, BTreeSet<String>>,
}

impl PackageSelection {
    pub fn new() -> Self {
        PackageSelection::default()
    }

    /// Record that `selector` matched `names`.
    ///
    /// A selector matching nothing is still registered so validation can
    /// report it.
    pub fn select<I, S>(&mut self, selector: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matched = self.matches.entry(selector.to_string()).or_default();
        for name in names {
            let name = name.into();
            matched.insert(name.clone());
            self.selection
                .entry(name.clone())
                .or_default()
                .insert(selector.to_string());
            self.packages.insert(name);
        }
    }

    /// Record a selector that matched nothing.
    pub fn record_selector(&mut self, selector: &str) {
        self.matches.entry(selector.to_string()).or_default();
    }

    /// Resolved package names, sorted.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Selectors that picked `name`.
    pub fn selectors_for(&self, name: &str) -> impl Iterator<Item = &str> {
        self.selection
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// All selectors seen, matched or not.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.matches.keys().map(String::as_str)
    }

    /// Packages `selector` matched, before filtering.
    pub fn matches_for(&self, selector: &str) -> impl Iterator<Item = &str> {
        self.matches
            .get(selector)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Check if `selector` matched at least one package.
    pub fn has_match_for(&self, selector: &str) -> bool {
        self.matches
            .get(selector)
            .is_some_and(|names| !names.is_empty())
    }

    /// Selector -> excluded package -> reason.
    pub fn exclusions(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.exclusions
    }

    /// Selector -> ignored packages.
    pub fn ignores(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.ignores
    }

    /// Drop excluded and ignored packages from the resolved set.
    ///
    /// The exclusions and ignores are recorded against every selector that
    /// matched the package. Returns the selectors that lost their last
    /// package in this call.
    pub fn filter_excluded_and_ignored(&mut self, ws: &Workspace) -> Vec<String> {
        let mut emptied = Vec::new();

        for (selector, names) in &self.matches {
            if names.is_empty() {
                continue;
            }

            let had_packages = names.iter().any(|n| {
                !self.is_recorded_exclusion(selector, n) && !self.is_recorded_ignore(selector, n)
            });

            for name in names {
                if let Some(reason) = ws.exclusion_reason(name) {
                    self.exclusions
                        .entry(selector.clone())
                        .or_default()
                        .entry(name.clone())
                        .or_insert_with(|| reason.to_string());
                } else if ws.is_ignored(name) {
                    self.ignores
                        .entry(selector.clone())
                        .or_default()
                        .insert(name.clone());
                }
            }

            let has_packages = names.iter().any(|n| {
                !self.is_recorded_exclusion(selector, n) && !self.is_recorded_ignore(selector, n)
            });
            if had_packages && !has_packages {
                emptied.push(selector.clone());
            }
        }

        self.packages
            .retain(|name| !ws.is_excluded(name) && !ws.is_ignored(name));
        emptied
    }

    fn is_recorded_exclusion(&self, selector: &str, name: &str) -> bool {
        self.exclusions
            .get(selector)
            .is_some_and(|names| names.contains_key(name))
    }

    fn is_recorded_ignore(&self, selector: &str, name: &str) -> bool {
        self.ignores
            .get(selector)
            .is_some_and(|names| names.contains(name))
    }
}
