//! # DAG Execution Engine
//!
//! Runs validated DAGs through plugin-backed tasks.
//!
//! ## Pieces
//!
//! - [`config`] — [`EngineConfig`] with the documented defaults
//! - [`context`] — [`ExecutionContext`] shared by all nodes of one run
//! - [`executor`] — the scheduler loop and skip propagation
//! - [`attempt`] — the per-node state machine (hooks, retries, fallback)
//! - [`result`] — terminal statuses, error taxonomy, run summary
//!
//! ## Clocks
//!
//! Retry delays and timeouts ride on the monotonic clock; wall-clock
//! timestamps appear only in trace events and result records.
//!
//! ## Shared state
//!
//! The plugin registry and metrics collector are injected services
//! (constructor parameters), shared across executions; everything else is
//! per-run.

pub mod attempt;
pub mod config;
pub mod context;
pub mod executor;
pub mod result;

pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use executor::Executor;
pub use result::{
    ErrorKind, ExecutionResult, NodeExecutionResult, NodeStatus, RunSummary,
};

use thiserror::Error;

use crate::dag::DagValidationError;
use crate::error::FixSuggestion;

// ============================================================================
// ERROR CODES
// ============================================================================

const CODE_INVALID_DAG: &str = "VF-401";
const CODE_INVALID_CONFIG: &str = "VF-402";
const CODE_CONTEXT_OVERFLOW: &str = "VF-403";
const CODE_INTERNAL: &str = "VF-404";

/// Faults raised by the executor before or during a run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The DAG failed structural validation; nothing was executed
    #[error("[{CODE_INVALID_DAG}] DAG validation failed with {} fault(s); first: {}", .faults.len(), .faults.first().map(|f| f.to_string()).unwrap_or_default())]
    InvalidDag { faults: Vec<DagValidationError> },

    #[error("[{CODE_INVALID_CONFIG}] Invalid engine config: {field} {message}")]
    InvalidConfig { field: String, message: String },

    #[error("[{CODE_CONTEXT_OVERFLOW}] Context variable '{key}' needs {needed} bytes, budget is {budget}")]
    ContextOverflow {
        key: String,
        needed: usize,
        budget: usize,
    },

    /// Invariant violation inside the executor; the run terminates
    #[error("[{CODE_INTERNAL}] Internal engine error: {message}")]
    Internal { message: String },
}

impl FixSuggestion for EngineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            EngineError::InvalidDag { .. } => {
                Some("Fix the listed DAG faults; nothing ran")
            }
            EngineError::InvalidConfig { .. } => Some("Correct the engine configuration value"),
            EngineError::ContextOverflow { .. } => {
                Some("Raise maxContextSize or store large values in the memory store")
            }
            EngineError::Internal { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{Dag, RetryPolicy, TaskNode};
    use crate::metrics::MetricsCollector;
    use crate::plugin::{PluginRegistry, ScriptedOutcome, ScriptedPlugin};
    use crate::trace::TraceLog;
    use serde_json::json;
    use std::sync::Arc;

    fn executor_with(
        plugins: Vec<Arc<ScriptedPlugin>>,
        config: EngineConfig,
    ) -> (Executor, Arc<MetricsCollector>) {
        let registry = Arc::new(PluginRegistry::new());
        for plugin in plugins {
            registry.register(plugin).unwrap();
        }
        let metrics = Arc::new(MetricsCollector::new());
        let executor = Executor::new(config, registry, Arc::clone(&metrics)).unwrap();
        (executor, metrics)
    }

    #[tokio::test]
    async fn linear_dag_runs_in_dependency_order() {
        let plugin = Arc::new(ScriptedPlugin::succeeding("pl", ["step"]));
        let (executor, metrics) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_lin");
        dag.add_node(TaskNode::new("a", "step"));
        dag.add_node(TaskNode::new("b", "step").with_dependencies(["a"]));
        dag.add_node(TaskNode::new("c", "step").with_dependencies(["b"]));

        let ctx = ExecutionContext::new();
        let trace = TraceLog::new();
        let summary = executor.execute(&dag, &ctx, &trace).await.unwrap();

        assert!(summary.all_succeeded());
        let ids: Vec<&str> = summary.results.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(metrics.get_metrics_snapshot().nodes_succeeded, 3);
    }

    #[tokio::test]
    async fn node_results_land_in_the_memory_store() {
        let plugin = Arc::new(ScriptedPlugin::succeeding("pl", ["step"]));
        let (executor, _) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_store");
        dag.add_node(TaskNode::new("a", "step"));

        let ctx = executor.new_context(None);
        let trace = TraceLog::new();
        executor.execute(&dag, &ctx, &trace).await.unwrap();

        let entry = ctx.store().get("result/a").unwrap();
        assert_eq!(entry.kind, crate::store::StoredEntry::EXECUTION);
        assert_eq!(entry.value["status"], json!("SUCCESS"));
    }

    #[tokio::test]
    async fn disabled_memory_store_records_nothing() {
        let plugin = Arc::new(ScriptedPlugin::succeeding("pl", ["step"]));
        let (executor, _) = executor_with(
            vec![plugin],
            EngineConfig {
                enable_memory_store: false,
                ..Default::default()
            },
        );

        let mut dag = Dag::new("dag_nostore");
        dag.add_node(TaskNode::new("a", "step"));

        let ctx = executor.new_context(None);
        let trace = TraceLog::new();
        executor.execute(&dag, &ctx, &trace).await.unwrap();
        assert!(ctx.store().get("result/a").is_none());
    }

    #[tokio::test]
    async fn failure_skips_all_downstream_nodes() {
        let plugin = Arc::new(ScriptedPlugin::with_script(
            "pl",
            ["step"],
            [ScriptedOutcome::Fail {
                category: ErrorKind::Execution,
                message: "broken".into(),
            }],
        ));
        let (executor, _) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_skip");
        dag.add_node(TaskNode::new("a", "step"));
        dag.add_node(TaskNode::new("b", "step").with_dependencies(["a"]));
        dag.add_node(TaskNode::new("c", "step").with_dependencies(["b"]));

        let ctx = ExecutionContext::new();
        let trace = TraceLog::new();
        let summary = executor.execute(&dag, &ctx, &trace).await.unwrap();

        assert_eq!(summary.status_of("a"), Some(NodeStatus::Failure));
        assert_eq!(summary.status_of("b"), Some(NodeStatus::Skipped));
        assert_eq!(summary.status_of("c"), Some(NodeStatus::Skipped));
        let b = summary.result("b").unwrap();
        assert!(b.result.message.contains("dependency skipped/failed"));
        // Dependency-skip is not a cancellation
        assert_eq!(b.result.error_type, None);
    }

    #[tokio::test]
    async fn invalid_dag_never_reaches_plugins() {
        let plugin = Arc::new(ScriptedPlugin::succeeding("pl", ["step"]));
        let probe = Arc::clone(&plugin);
        let (executor, _) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_bad");
        dag.add_node(TaskNode::new("a", "step").with_dependencies(["ghost"]));

        let ctx = ExecutionContext::new();
        let trace = TraceLog::new();
        let err = executor.execute(&dag, &ctx, &trace).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidDag { .. }));
        assert_eq!(probe.invocations(), 0);
    }

    #[tokio::test]
    async fn max_retries_zero_attempts_exactly_once() {
        let plugin = Arc::new(ScriptedPlugin::with_script(
            "pl",
            ["step"],
            [ScriptedOutcome::Fail {
                category: ErrorKind::Network,
                message: "flaky".into(),
            }],
        ));
        let probe = Arc::clone(&plugin);
        let (executor, _) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_once");
        dag.add_node(TaskNode::new("a", "step"));

        let ctx = ExecutionContext::new();
        let trace = TraceLog::new();
        let summary = executor.execute(&dag, &ctx, &trace).await.unwrap();
        assert_eq!(summary.status_of("a"), Some(NodeStatus::Failure));
        assert_eq!(probe.invocations(), 1);
        assert_eq!(summary.result("a").unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn unknown_action_fails_the_node_not_the_run() {
        let plugin = Arc::new(ScriptedPlugin::succeeding("pl", ["known"]));
        let (executor, _) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_unknown");
        dag.add_node(TaskNode::new("a", "missing_action"));
        dag.add_node(TaskNode::new("b", "known"));

        let ctx = ExecutionContext::new();
        let trace = TraceLog::new();
        let summary = executor.execute(&dag, &ctx, &trace).await.unwrap();
        assert_eq!(summary.status_of("a"), Some(NodeStatus::Failure));
        assert_eq!(
            summary.result("a").unwrap().result.error_type,
            Some(ErrorKind::System)
        );
        // Sibling branch unaffected
        assert_eq!(summary.status_of("b"), Some(NodeStatus::Success));
    }

    #[tokio::test]
    async fn node_retry_policy_overrides_engine_defaults() {
        let plugin = Arc::new(ScriptedPlugin::with_script(
            "pl",
            ["step"],
            [
                ScriptedOutcome::Fail {
                    category: ErrorKind::Io,
                    message: "io".into(),
                },
                ScriptedOutcome::Succeed(json!("ok")),
            ],
        ));
        let probe = Arc::clone(&plugin);
        // Engine default says no retries; the node says one retry
        let (executor, metrics) = executor_with(vec![plugin], EngineConfig::default());

        let mut dag = Dag::new("dag_retry");
        dag.add_node(
            TaskNode::new("a", "step").with_retry(RetryPolicy::new(1, 1, 1.0)),
        );

        let ctx = ExecutionContext::new();
        let trace = TraceLog::new();
        let summary = executor.execute(&dag, &ctx, &trace).await.unwrap();
        assert_eq!(summary.status_of("a"), Some(NodeStatus::Success));
        assert_eq!(probe.invocations(), 2);
        assert_eq!(metrics.get_metrics_snapshot().retries, 1);
    }
}
