//! # DAG Model
//!
//! The executable view of a workflow: an ordered list of task nodes with
//! id-based dependencies. `dependency_ids` is the only persisted link
//! state; the doubly-linked dependency/dependent view is derived through
//! [`DepGraph::from_dag`], the single rebuild entry point (serialization
//! exposes ids only, deserialization triggers the same rebuild).
//!
//! Nodes are mutated only before execution begins; execution-time state
//! (status, timings, errors) lives in the result set, never on the node.

pub mod graph;
pub mod validate;

pub use graph::DepGraph;
pub use validate::{validate_dag, DagValidationError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// RETRY POLICY
// ============================================================================

/// Per-node retry configuration.
///
/// The engine substitutes its own defaults for any node whose policy is
/// exactly [`RetryPolicy::default`], so "unset" and "explicitly zero
/// retries with default delays" are intentionally the same thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Additional attempts after the first (0 = try once)
    pub max_retries: u32,
    /// Base delay before the first retry
    pub retry_delay_ms: u64,
    /// Multiplier applied per retry: delay_i = retry_delay_ms * backoff^i
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 1000,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            retry_delay_ms,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    /// Delay before retry attempt `i` (0-based), in milliseconds
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        (self.retry_delay_ms as f64 * factor).round() as u64
    }
}

// ============================================================================
// TASK NODE
// ============================================================================

/// One executable node of a DAG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: String,
    /// Plugin action key dispatched through the registry
    pub action: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub input_params: Map<String, Value>,
    /// Plugin action invoked before each attempt round (warning-only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_hook: Option<String>,
    /// Plugin action invoked after the node settles (warning-only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_hook: Option<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Plugin dispatched once when primary attempts are exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_plugin_id: Option<String>,
    /// Ids of nodes that must settle before this one runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            input_params: Map::new(),
            before_hook: None,
            after_hook: None,
            retry: RetryPolicy::default(),
            fallback_plugin_id: None,
            dependency_ids: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fallback(mut self, plugin_id: impl Into<String>) -> Self {
        self.fallback_plugin_id = Some(plugin_id.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input_params.insert(key.into(), value);
        self
    }

    pub fn with_before_hook(mut self, action: impl Into<String>) -> Self {
        self.before_hook = Some(action.into());
        self
    }

    pub fn with_after_hook(mut self, action: impl Into<String>) -> Self {
        self.after_hook = Some(action.into());
        self
    }
}

// ============================================================================
// DAG
// ============================================================================

/// A directed acyclic graph of task nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dag {
    pub id: String,
    pub nodes: Vec<TaskNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_node: Option<String>,
    /// Set by the projector to cross-reference the source net
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from_petri_net_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<String>,
}

impl Dag {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            root_node: None,
            derived_from_petri_net_id: None,
            metadata: Map::new(),
            validation_warnings: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: TaskNode) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Rebuild the resolved dependency/dependent links from
    /// `dependency_ids`. The only way link state is derived.
    pub fn rebuild_links(&self) -> DepGraph {
        DepGraph::from_dag(self)
    }

    /// Serialize to the canonical JSON document form
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from a JSON document
    pub fn from_json_str(raw: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_with_backoff() {
        let policy = RetryPolicy::new(3, 10, 2.0);
        assert_eq!(policy.delay_for_attempt(0), 10);
        assert_eq!(policy.delay_for_attempt(1), 20);
        assert_eq!(policy.delay_for_attempt(2), 40);
    }

    #[test]
    fn backoff_of_one_gives_constant_delay() {
        let policy = RetryPolicy::new(5, 250, 1.0);
        assert_eq!(policy.delay_for_attempt(0), 250);
        assert_eq!(policy.delay_for_attempt(4), 250);
    }

    #[test]
    fn backoff_below_one_is_clamped() {
        let policy = RetryPolicy::new(2, 100, 0.5);
        assert_eq!(policy.delay_for_attempt(1), 100);
    }

    #[test]
    fn dag_json_round_trip() {
        let mut dag = Dag::new("dag_x");
        dag.add_node(
            TaskNode::new("build", "compile")
                .with_param("target", Value::String("release".into()))
                .with_retry(RetryPolicy::new(2, 50, 2.0)),
        );
        dag.add_node(TaskNode::new("test", "run_tests").with_dependencies(["build"]));
        dag.root_node = Some("build".into());

        let json = dag.to_json().unwrap();
        let back = Dag::from_json_str(&json).unwrap();
        assert_eq!(dag, back);
        // Links are derived, not persisted
        assert!(!json.contains("dependents"));
        let graph = back.rebuild_links();
        assert_eq!(graph.dependents_of("build"), &["test"]);
    }

    #[test]
    fn node_retry_defaults_match_spec() {
        let node = TaskNode::new("n", "a");
        assert_eq!(node.retry.max_retries, 0);
        assert_eq!(node.retry.retry_delay_ms, 1000);
        assert_eq!(node.retry.backoff_multiplier, 1.0);
    }
}
