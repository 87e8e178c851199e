//! DAG executor: dependency-respecting sequential scheduler.
//!
//! The conformant single-threaded strategy: walk the topological order,
//! run each node through the per-node state machine, and propagate
//! SKIPPED to everything downstream of a failure or skip. Cancellation
//! and the run deadline are observed at node boundaries; nodes that never
//! started are skipped as CANCELLED.
//!
//! Validation runs before any plugin: a structurally broken DAG never
//! reaches the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dag::{validate_dag, Dag};
use crate::metrics::MetricsCollector;
use crate::plugin::PluginRegistry;
use crate::store::{InMemoryStore, MemoryStore, StoredEntry};
use crate::trace::{epoch_ms, TraceEventDraft, TraceLog};

use super::attempt::NodeExecutor;
use super::config::EngineConfig;
use super::context::ExecutionContext;
use super::result::{
    ErrorKind, ExecutionResult, NodeExecutionResult, NodeStatus, RunSummary,
};
use super::EngineError;

/// Executes validated DAGs against a plugin registry
pub struct Executor {
    config: EngineConfig,
    registry: Arc<PluginRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl Executor {
    /// Create an executor; the config is validated once here
    pub fn new(
        config: EngineConfig,
        registry: Arc<PluginRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            metrics,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a context sized by this executor's `max_context_size`,
    /// backed by the given store (or a private one)
    pub fn new_context(&self, store: Option<Arc<dyn MemoryStore>>) -> ExecutionContext {
        let store = store.unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        ExecutionContext::with_store(store, self.config.max_context_size)
    }

    /// Execute `dag` with a private cancellation token
    pub async fn execute(
        &self,
        dag: &Dag,
        ctx: &ExecutionContext,
        trace: &TraceLog,
    ) -> Result<RunSummary, EngineError> {
        self.execute_with_cancel(dag, ctx, trace, CancellationToken::new())
            .await
    }

    /// Execute `dag`; the caller keeps the token and may cancel at any
    /// node/attempt boundary.
    pub async fn execute_with_cancel(
        &self,
        dag: &Dag,
        ctx: &ExecutionContext,
        trace: &TraceLog,
        cancel: CancellationToken,
    ) -> Result<RunSummary, EngineError> {
        let faults = validate_dag(dag);
        if !faults.is_empty() {
            return Err(EngineError::InvalidDag { faults });
        }

        let graph = dag.rebuild_links();
        let order = graph
            .topological_order()
            .ok_or_else(|| EngineError::Internal {
                message: "validated DAG lost its topological order".to_string(),
            })?;

        let started = Instant::now();
        let run_deadline = (self.config.execution_timeout_ms > 0)
            .then(|| started + Duration::from_millis(self.config.execution_timeout_ms));
        if self.config.enable_metrics {
            self.metrics.record_execution_start();
        }
        info!(
            dag = %dag.id,
            execution = %ctx.execution_id(),
            correlation = %ctx.trace().correlation_id,
            nodes = order.len(),
            "execution started"
        );

        let node_executor = NodeExecutor {
            config: &self.config,
            registry: &self.registry,
            metrics: self.config.enable_metrics.then_some(self.metrics.as_ref()),
            trace: self.config.enable_tracing.then_some(trace),
            cancel: &cancel,
            run_deadline,
        };

        let mut statuses: HashMap<String, NodeStatus> = HashMap::new();
        let mut results: Vec<NodeExecutionResult> = Vec::with_capacity(order.len());
        let mut cancelled = false;

        for (position, node_id) in order.iter().enumerate() {
            let node = dag
                .node(node_id)
                .ok_or_else(|| EngineError::Internal {
                    message: format!("ordered node '{}' missing from DAG", node_id),
                })?;

            let deadline_hit = run_deadline.map(|d| Instant::now() >= d).unwrap_or(false);
            if cancel.is_cancelled() || deadline_hit {
                cancelled = true;
                let reason = if deadline_hit {
                    "execution timeout"
                } else {
                    "execution cancelled"
                };
                let result = self.skipped(node_id, reason, Some(ErrorKind::Cancelled), trace);
                statuses.insert(node_id.clone(), result.status);
                results.push(result);
                continue;
            }

            // Skip propagation: any failed or skipped dependency settles
            // this node without running it
            let blocked: Vec<&String> = graph
                .dependencies_of(node_id)
                .iter()
                .filter(|dep| {
                    !matches!(statuses.get(dep.as_str()), Some(NodeStatus::Success))
                })
                .collect();
            if !blocked.is_empty() {
                let reason = format!(
                    "dependency skipped/failed: {}",
                    blocked
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                debug!(node = %node_id, %reason, "propagating skip");
                let result = self.skipped(node_id, &reason, None, trace);
                statuses.insert(node_id.clone(), result.status);
                results.push(result);
                continue;
            }

            let ready_now = ready_set(&order[position..], &graph, &statuses);
            if self.config.debug_mode {
                info!(node = %node_id, ready = ?ready_now, "scheduling node");
            }
            let result = node_executor.run(node, ctx, &ready_now).await;
            if result.result.error_type == Some(ErrorKind::Cancelled) {
                cancelled = true;
            }
            debug!(node = %node_id, status = ?result.status, attempts = result.attempts, "node settled");
            if self.config.enable_memory_store {
                ctx.store().put(
                    &format!("result/{}", node_id),
                    StoredEntry::execution(serde_json::json!({
                        "status": result.status,
                        "message": result.result.message,
                        "data": result.result.data,
                    })),
                );
            }
            statuses.insert(node_id.clone(), result.status);
            results.push(result);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        if self.config.enable_metrics {
            self.metrics.record_execution_complete(duration_ms);
        }

        let summary = RunSummary {
            execution_id: ctx.execution_id().to_string(),
            dag_id: dag.id.clone(),
            nodes_succeeded: count(&results, NodeStatus::Success),
            nodes_failed: count(&results, NodeStatus::Failure),
            nodes_skipped: count(&results, NodeStatus::Skipped),
            results,
            duration_ms,
            cancelled: cancelled || cancel.is_cancelled(),
        };
        info!(
            dag = %dag.id,
            succeeded = summary.nodes_succeeded,
            failed = summary.nodes_failed,
            skipped = summary.nodes_skipped,
            duration_ms,
            "execution finished"
        );
        Ok(summary)
    }

    /// Settle a node as SKIPPED without running it
    fn skipped(
        &self,
        node_id: &str,
        reason: &str,
        kind: Option<ErrorKind>,
        trace: &TraceLog,
    ) -> NodeExecutionResult {
        let now = epoch_ms();
        if self.config.enable_metrics {
            self.metrics.record_node_complete(NodeStatus::Skipped.metric_name(), 0);
        }
        if self.config.enable_tracing {
            let mut draft = TraceEventDraft::node(node_id);
            draft.metadata.reason = Some(reason.to_string());
            trace.append(draft);
        }
        let result = match kind {
            Some(kind) => ExecutionResult::failure(reason, kind),
            None => ExecutionResult {
                success: false,
                message: reason.to_string(),
                data: None,
                error: None,
                error_type: None,
            },
        };
        NodeExecutionResult {
            node_id: node_id.to_string(),
            status: NodeStatus::Skipped,
            error: result.error.clone(),
            result,
            start_time: now,
            end_time: now,
            attempts: 0,
            fallback_used: false,
        }
    }
}

/// Ids from `remaining` whose dependencies have all succeeded
fn ready_set(
    remaining: &[String],
    graph: &crate::dag::DepGraph,
    statuses: &HashMap<String, NodeStatus>,
) -> Vec<String> {
    remaining
        .iter()
        .filter(|id| {
            graph
                .dependencies_of(id)
                .iter()
                .all(|dep| matches!(statuses.get(dep.as_str()), Some(NodeStatus::Success)))
        })
        .cloned()
        .collect()
}

fn count(results: &[NodeExecutionResult], status: NodeStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}
