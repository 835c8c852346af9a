// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Package dependency graph and load scheduling.
//!
//! A package is internal when it owns at least one template file. Internal
//! packages must be loaded dependencies-first so each one is type-checked
//! against the stand-ins of the packages it imports.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::ResolveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub path: String,
    pub dir: Option<PathBuf>,
    /// Template files owned by this package.
    pub files: IndexSet<PathBuf>,
    pub declares_components: bool,
    /// Packages this one imports.
    pub dependencies: IndexSet<String>,
    /// Packages importing this one.
    pub dependents: IndexSet<String>,
}

impl PackageNode {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            dir: None,
            files: IndexSet::new(),
            declares_components: false,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<String, PackageNode>,
    internal: IndexSet<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_mut(&mut self, path: &str) -> &mut PackageNode {
        self.nodes
            .entry(path.to_string())
            .or_insert_with(|| PackageNode::new(path))
    }

    /// Add a package or update an existing one. A known directory is never
    /// forgotten and `declares_components` is never reset.
    pub fn add_package(&mut self, path: &str, dir: Option<PathBuf>, declares_components: bool) {
        let node = self.node_mut(path);
        if dir.is_some() {
            node.dir = dir;
        }
        node.declares_components |= declares_components;
    }

    /// Record that `from` imports `to`, creating either end if needed.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        self.node_mut(from).dependencies.insert(to.to_string());
        self.node_mut(to).dependents.insert(from.to_string());
    }

    /// Record that `path` owns the template file `file`.
    pub fn add_template_file(&mut self, path: &str, file: PathBuf) {
        self.node_mut(path).files.insert(file);
    }

    /// Recompute the internal set from scratch.
    pub fn build_internal_packages(&mut self) {
        self.internal = self
            .nodes
            .values()
            .filter(|n| !n.files.is_empty())
            .map(|n| n.path.clone())
            .collect();
    }

    pub fn is_internal(&self, path: &str) -> bool {
        self.internal.contains(path)
    }

    pub fn internal_packages(&self) -> impl Iterator<Item = &str> {
        self.internal.iter().map(String::as_str)
    }

    pub fn node(&self, path: &str) -> Option<&PackageNode> {
        self.nodes.get(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PackageNode> {
        self.nodes.values()
    }

    /// The package whose directory is `dir`.
    pub fn package_for_dir(&self, dir: &Path) -> Option<&PackageNode> {
        self.nodes.values().find(|n| n.dir.as_deref() == Some(dir))
    }

    /// Order `subset` so every package comes after the packages it depends
    /// on. Only edges with both ends in the subset count. Ties keep the
    /// subset's order. A package importing itself is a one-package cycle.
    pub fn topological_sort<'a, I>(&self, subset: I) -> Result<Vec<String>, ResolveError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let subset: IndexSet<&str> = subset.into_iter().collect();
        let deps_in_subset = |path: &str| -> Vec<&str> {
            self.nodes
                .get(path)
                .map(|n| {
                    n.dependencies
                        .iter()
                        .map(String::as_str)
                        .filter(|d| subset.contains(d))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut in_degree: IndexMap<&str, usize> = subset
            .iter()
            .map(|&p| (p, deps_in_subset(p).len()))
            .collect();
        let mut ready: std::collections::VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&p, _)| p)
            .collect();
        let mut order = Vec::with_capacity(subset.len());

        while let Some(path) = ready.pop_front() {
            order.push(path.to_string());
            let dependents = self
                .nodes
                .get(path)
                .map(|n| n.dependents.iter().map(String::as_str).collect::<Vec<_>>())
                .unwrap_or_default();
            for dependent in dependents {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    if *deg > 0 {
                        *deg -= 1;
                        if *deg == 0 {
                            ready.push_back(dependent);
                        }
                    }
                }
            }
        }

        if order.len() < subset.len() {
            let remaining: IndexSet<&str> = subset
                .iter()
                .copied()
                .filter(|p| !order.iter().any(|o| o == p))
                .collect();
            return Err(ResolveError::cycle(self.find_cycle(&remaining)));
        }
        debug!(order = ?order, "scheduled internal packages");
        Ok(order)
    }

    /// Extract one cycle from nodes that could not be sorted. Every such node
    /// has a dependency among them, so walking dependencies must revisit a
    /// node.
    fn find_cycle(&self, remaining: &IndexSet<&str>) -> Vec<String> {
        let Some(&start) = remaining.first() else {
            return Vec::new();
        };
        let mut walk: Vec<&str> = vec![start];
        loop {
            let Some(&current) = walk.last() else {
                return Vec::new();
            };
            let next = self.nodes.get(current).and_then(|n| {
                n.dependencies
                    .iter()
                    .map(String::as_str)
                    .find(|d| remaining.contains(d))
            });
            let Some(next) = next else {
                return walk.iter().map(|s| s.to_string()).collect();
            };
            if let Some(pos) = walk.iter().position(|&w| w == next) {
                let mut cycle: Vec<String> = walk[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.to_string());
                return cycle;
            }
            walk.push(next);
        }
    }
}
