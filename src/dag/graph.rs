//! Dependency graph derived from a DAG's `dependency_ids`.
//!
//! `dependency_ids` on the nodes is the persistent truth; this graph is
//! the derived, doubly-linked view (dependencies and dependents wired
//! mutually). [`DepGraph::from_dag`] is the single rebuild entry point —
//! the projector, validator and executor all resolve links through it so
//! the two directions can never diverge.

use std::collections::{HashMap, HashSet, VecDeque};

use super::Dag;

/// Resolved dependency links for one DAG
pub struct DepGraph {
    /// node id -> ids it depends on (insertion order, duplicate-free)
    dependencies: HashMap<String, Vec<String>>,
    /// node id -> ids depending on it (insertion order)
    dependents: HashMap<String, Vec<String>>,
    /// node ids in DAG insertion order
    node_ids: Vec<String>,
}

impl DepGraph {
    /// Build both link directions from the persisted `dependency_ids`.
    ///
    /// Unknown dependency ids are skipped here; validation reports them
    /// with proper diagnostics before execution.
    pub fn from_dag(dag: &Dag) -> Self {
        let node_ids: Vec<String> = dag.nodes.iter().map(|n| n.id.clone()).collect();
        let known: HashSet<&str> = node_ids.iter().map(|s| s.as_str()).collect();

        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for id in &node_ids {
            dependencies.insert(id.clone(), Vec::new());
            dependents.insert(id.clone(), Vec::new());
        }

        for node in &dag.nodes {
            let mut seen: HashSet<&str> = HashSet::new();
            for dep in &node.dependency_ids {
                if !known.contains(dep.as_str()) || dep == &node.id || !seen.insert(dep) {
                    continue;
                }
                dependencies
                    .get_mut(&node.id)
                    .expect("node registered above")
                    .push(dep.clone());
                dependents
                    .get_mut(dep)
                    .expect("known id registered above")
                    .push(node.id.clone());
            }
        }

        Self {
            dependencies,
            dependents,
            node_ids,
        }
    }

    /// Ids this node depends on
    pub fn dependencies_of(&self, node_id: &str) -> &[String] {
        self.dependencies
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Ids depending on this node
    pub fn dependents_of(&self, node_id: &str) -> &[String] {
        self.dependents
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Node ids with no dependencies, in insertion order
    pub fn roots(&self) -> Vec<&str> {
        self.node_ids
            .iter()
            .filter(|id| self.dependencies_of(id).is_empty())
            .map(|s| s.as_str())
            .collect()
    }

    /// True if a dependency path leads from `from` to `to`
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seen: HashSet<&str> = HashSet::new();
        queue.push_back(from);
        seen.insert(from);
        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current) {
                if next == to {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Node ids reachable (as dependents) from the given start set
    pub fn reachable_from(&self, starts: &[&str]) -> HashSet<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for &start in starts {
            if self.dependencies.contains_key(start) && seen.insert(start.to_string()) {
                queue.push_back(start);
            }
        }
        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current) {
                if seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Kahn topological order; `None` when the graph has a cycle.
    ///
    /// Deterministic: ready nodes are taken in DAG insertion order.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .node_ids
            .iter()
            .map(|id| (id.as_str(), self.dependencies_of(id).len()))
            .collect();

        let mut ready: VecDeque<&str> = self
            .node_ids
            .iter()
            .filter(|id| in_degree[id.as_str()] == 0)
            .map(|s| s.as_str())
            .collect();

        let mut order = Vec::with_capacity(self.node_ids.len());
        while let Some(current) = ready.pop_front() {
            order.push(current.to_string());
            for next in self.dependents_of(current) {
                let degree = in_degree
                    .get_mut(next.as_str())
                    .expect("dependent ids are known nodes");
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(next);
                }
            }
        }

        (order.len() == self.node_ids.len()).then_some(order)
    }
}
