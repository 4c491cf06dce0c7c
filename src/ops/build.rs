//! Build orchestration.
//!
//! Decides which packages get a forced or clean build, and in which order
//! the enabled packages are handed to the [`Builder`]. Running the build
//! steps themselves is up to the builder.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::core::errors::FlotillaError;
use crate::core::workspace::Workspace;

/// How much of the previous build is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Only rebuild what changed
    #[default]
    Incremental,
    /// Rerun every build step of the scoped packages
    Force,
    /// Clean the scoped packages, then build them from scratch
    Rebuild,
}

impl BuildMode {
    /// `--rebuild` supersedes `--force`.
    pub fn from_flags(force: bool, rebuild: bool) -> Self {
        if rebuild {
            BuildMode::Rebuild
        } else if force {
            BuildMode::Force
        } else {
            BuildMode::Incremental
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Incremental => write!(f, "incremental"),
            BuildMode::Force => write!(f, "force"),
            BuildMode::Rebuild => write!(f, "rebuild"),
        }
    }
}

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;
}

impl<F> Confirm for F
where
    F: FnMut(&str, bool) -> Result<bool>,
{
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        self(question, default)
    }
}

/// Receives the packages to build, dependencies first.
pub trait Builder {
    fn build(&mut self, plan: &BuildPlan) -> Result<()>;
}

/// One package of a build plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedPackage {
    pub name: String,
    pub srcdir: PathBuf,
    pub force: bool,
    pub clean: bool,
    /// Effective dependencies inside the plan
    pub dependencies: Vec<String>,
}

/// Dependency-ordered list of packages to build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub mode: BuildMode,
    pub packages: Vec<PlannedPackage>,
}

impl BuildPlan {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|p| p.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Builder that prints the plan instead of running it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanPrinter {
    json: bool,
}

impl PlanPrinter {
    pub fn new(json: bool) -> Self {
        PlanPrinter { json }
    }

    /// Render the plan the way it is printed.
    pub fn render(&self, plan: &BuildPlan) -> Result<String> {
        if self.json {
            return serde_json::to_string(plan).context("failed to serialize build plan");
        }

        let mut out = format!(
            "build plan ({}, {} packages):\n",
            plan.mode,
            plan.packages.len()
        );
        for (i, pkg) in plan.packages.iter().enumerate() {
            let mark = match (pkg.clean, pkg.force) {
                (true, _) => " [clean]",
                (false, true) => " [force]",
                _ => "",
            };
            out.push_str(&format!("{:>4}. {}{}\n", i + 1, pkg.name, mark));
        }
        Ok(out)
    }
}

impl Builder for PlanPrinter {
    fn build(&mut self, plan: &BuildPlan) -> Result<()> {
        print!("{}", self.render(plan)?);
        Ok(())
    }
}

/// Options for the build orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub mode: BuildMode,

    /// Apply force/rebuild to the dependencies of the selection too
    pub with_depends: bool,

    /// Build the dependencies of the selection
    pub deps: bool,

    /// No packages were named, the whole workspace is built
    pub whole_workspace: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            mode: BuildMode::Incremental,
            with_depends: false,
            deps: true,
            whole_workspace: false,
        }
    }
}

/// Mark packages for the requested build mode and hand the plan to `builder`.
///
/// `selected` is the filtered selection, `enabled` the set returned by the
/// import engine. A forced or clean build of the whole workspace must be
/// confirmed first; declining returns [`FlotillaError::Cancelled`] without
/// marking anything. A selection emptied by exclusions is not the whole
/// workspace, it builds nothing.
pub fn build(
    ws: &mut Workspace,
    selected: &BTreeSet<String>,
    enabled: &BTreeSet<String>,
    opts: &BuildOptions,
    confirm: &mut dyn Confirm,
    builder: &mut dyn Builder,
) -> Result<BuildPlan> {
    if opts.mode != BuildMode::Incremental && opts.whole_workspace {
        let question = match opts.mode {
            BuildMode::Rebuild => "You asked to clean and rebuild the whole workspace. Proceed?",
            _ => "You asked to force the build of the whole workspace. Proceed?",
        };
        if !confirm.confirm(question, false)? {
            return Err(FlotillaError::Cancelled.into());
        }
    }

    let mut to_build = enabled.clone();
    if !opts.deps && !opts.whole_workspace {
        for name in enabled.difference(selected) {
            if let Some(record) = ws.registry_mut().find_mut(name) {
                tracing::debug!("not building {}, dependencies are disabled", name);
                record.disable();
            }
        }
        to_build.retain(|name| selected.contains(name));
    }

    let scope = if opts.whole_workspace || opts.with_depends {
        enabled
    } else {
        selected
    };
    for name in scope {
        let Some(record) = ws.registry_mut().find_mut(name) else {
            continue;
        };
        match opts.mode {
            BuildMode::Incremental => {}
            BuildMode::Force => record.prepare_for_forced_build(),
            BuildMode::Rebuild => record.prepare_for_rebuild(),
        }
    }

    let plan = BuildPlan {
        mode: opts.mode,
        packages: build_order(ws, &to_build)?,
    };
    tracing::info!("building {} packages", plan.packages.len());
    builder.build(&plan)?;
    Ok(plan)
}

/// Order `names` so that dependencies come before their dependents.
fn build_order(ws: &Workspace, names: &BTreeSet<String>) -> Result<Vec<PlannedPackage>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    for name in names {
        nodes.insert(name.as_str(), graph.add_node(name.as_str()));
    }

    for name in names {
        let Some(record) = ws.registry().find(name) else {
            continue;
        };
        for dep in record.effective_dependencies() {
            if let (Some(&from), Some(&to)) = (nodes.get(dep), nodes.get(name.as_str())) {
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| FlotillaError::DependencyCycle {
        package: graph[cycle.node_id()].to_string(),
    })?;

    Ok(order
        .into_iter()
        .filter_map(|node| ws.registry().find(graph[node]))
        .map(|record| PlannedPackage {
            name: record.name().to_string(),
            srcdir: record.srcdir().to_path_buf(),
            force: record.marks().force,
            clean: record.marks().clean,
            dependencies: record
                .effective_dependencies()
                .filter(|dep| names.contains(*dep))
                .map(str::to_string)
                .collect(),
        })
        .collect())
}
