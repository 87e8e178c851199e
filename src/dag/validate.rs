//! DAG structural validation.
//!
//! Runs before any plugin call: duplicate/invalid ids, dangling or
//! self-referencing dependencies, cycles, unknown root, and orphan nodes
//! unreachable from the root set. Every error carries a field path, a
//! stable code and a fix suggestion; all faults are collected in one pass
//! rather than failing on the first.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::FixSuggestion;
use crate::net::is_valid_id;

use super::Dag;

// ============================================================================
// ERROR CODES
// ============================================================================

const CODE_EMPTY: &str = "VF-201";
const CODE_INVALID_ID: &str = "VF-202";
const CODE_DUPLICATE_ID: &str = "VF-203";
const CODE_DANGLING_DEP: &str = "VF-204";
const CODE_SELF_DEP: &str = "VF-205";
const CODE_CYCLE: &str = "VF-206";
const CODE_UNKNOWN_ROOT: &str = "VF-207";
const CODE_ORPHAN: &str = "VF-208";
const CODE_EMPTY_ACTION: &str = "VF-209";

// ============================================================================
// ERRORS
// ============================================================================

/// Structural faults in a DAG
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DagValidationError {
    #[error("[{CODE_EMPTY}] DAG '{dag_id}' has no nodes")]
    Empty { dag_id: String },

    #[error("[{CODE_INVALID_ID}] nodes[{index}].id: invalid id '{id}'")]
    InvalidId { index: usize, id: String },

    #[error("[{CODE_DUPLICATE_ID}] nodes[{index}].id: duplicate node id '{id}'")]
    DuplicateId { index: usize, id: String },

    #[error(
        "[{CODE_DANGLING_DEP}] nodes[{index}].dependencyIds: '{node_id}' references unknown node '{dependency}'"
    )]
    DanglingDependency {
        index: usize,
        node_id: String,
        dependency: String,
    },

    #[error("[{CODE_SELF_DEP}] nodes[{index}].dependencyIds: '{node_id}' depends on itself")]
    SelfDependency { index: usize, node_id: String },

    #[error("[{CODE_CYCLE}] DAG '{dag_id}' contains a dependency cycle through: {members:?}")]
    Cycle { dag_id: String, members: Vec<String> },

    #[error("[{CODE_UNKNOWN_ROOT}] rootNode: '{root}' is not a node of the DAG")]
    UnknownRoot { root: String },

    #[error("[{CODE_ORPHAN}] nodes[{index}]: '{node_id}' is unreachable from the root set")]
    Orphan { index: usize, node_id: String },

    #[error("[{CODE_EMPTY_ACTION}] nodes[{index}].action: node '{node_id}' has an empty action")]
    EmptyAction { index: usize, node_id: String },
}

impl FixSuggestion for DagValidationError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DagValidationError::Empty { .. } => Some("Add at least one task node"),
            DagValidationError::InvalidId { .. } => {
                Some("Rename the id to alphanumerics, '_', '-' or '.'")
            }
            DagValidationError::DuplicateId { .. } => Some("Make every node id unique"),
            DagValidationError::DanglingDependency { .. } => {
                Some("Declare the dependency as a node, or remove the reference")
            }
            DagValidationError::SelfDependency { .. } => {
                Some("Remove the node's own id from its dependencyIds")
            }
            DagValidationError::Cycle { .. } => {
                Some("Break the cycle; execution order requires acyclic dependencies")
            }
            DagValidationError::UnknownRoot { .. } => {
                Some("Point rootNode at an existing node id, or unset it")
            }
            DagValidationError::Orphan { .. } => {
                Some("Connect the node to the graph, or remove it")
            }
            DagValidationError::EmptyAction { .. } => {
                Some("Set the action to a registered plugin action key")
            }
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate a DAG, collecting every fault
pub fn validate_dag(dag: &Dag) -> Vec<DagValidationError> {
    let mut faults = Vec::new();

    if dag.nodes.is_empty() {
        faults.push(DagValidationError::Empty {
            dag_id: dag.id.clone(),
        });
        return faults;
    }

    let mut ids: HashSet<&str> = HashSet::new();
    for (index, node) in dag.nodes.iter().enumerate() {
        if !is_valid_id(&node.id) {
            faults.push(DagValidationError::InvalidId {
                index,
                id: node.id.clone(),
            });
        }
        if !ids.insert(&node.id) {
            faults.push(DagValidationError::DuplicateId {
                index,
                id: node.id.clone(),
            });
        }
        if node.action.trim().is_empty() {
            faults.push(DagValidationError::EmptyAction {
                index,
                node_id: node.id.clone(),
            });
        }
    }

    for (index, node) in dag.nodes.iter().enumerate() {
        for dep in &node.dependency_ids {
            if dep == &node.id {
                faults.push(DagValidationError::SelfDependency {
                    index,
                    node_id: node.id.clone(),
                });
            } else if !ids.contains(dep.as_str()) {
                faults.push(DagValidationError::DanglingDependency {
                    index,
                    node_id: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    if let Some(root) = &dag.root_node {
        if !ids.contains(root.as_str()) {
            faults.push(DagValidationError::UnknownRoot { root: root.clone() });
        }
    }

    let graph = dag.rebuild_links();
    match graph.topological_order() {
        Some(order) => {
            // Acyclic: check reachability from the root set
            let roots: Vec<&str> = match &dag.root_node {
                Some(root) if ids.contains(root.as_str()) => vec![root.as_str()],
                _ => graph.roots(),
            };
            let reachable = graph.reachable_from(&roots);
            for (index, node) in dag.nodes.iter().enumerate() {
                if !reachable.contains(&node.id) {
                    faults.push(DagValidationError::Orphan {
                        index,
                        node_id: node.id.clone(),
                    });
                }
            }
            debug_assert_eq!(order.len(), dag.nodes.len());
        }
        None => {
            // Name the nodes left out of every topological prefix
            let ordered: HashSet<String> = {
                let mut placed = HashSet::new();
                let mut changed = true;
                while changed {
                    changed = false;
                    for node in &dag.nodes {
                        if placed.contains(&node.id) {
                            continue;
                        }
                        let deps_ok = graph
                            .dependencies_of(&node.id)
                            .iter()
                            .all(|d| placed.contains(d));
                        if deps_ok {
                            placed.insert(node.id.clone());
                            changed = true;
                        }
                    }
                }
                placed
            };
            let members: Vec<String> = dag
                .nodes
                .iter()
                .filter(|n| !ordered.contains(&n.id))
                .map(|n| n.id.clone())
                .collect();
            faults.push(DagValidationError::Cycle {
                dag_id: dag.id.clone(),
                members,
            });
        }
    }

    faults
}
