//! Per-node state machine.
//!
//! One node runs as: before-hook, plugin attempts with retry/backoff,
//! optional fallback, after-hook, finalize. Hooks are warning-only and
//! deadline-bounded; the after-hook runs on every exit path. Retry delays
//! are computed here (never by plugins) on the monotonic clock, and every
//! wait — hook, plugin attempt, backoff sleep — observes cancellation and
//! the run deadline.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dag::{RetryPolicy, TaskNode};
use crate::metrics::MetricsCollector;
use crate::plugin::{PluginRegistry, PluginResult};
use crate::trace::{epoch_ms, TraceEventDraft, TraceLog};

use super::config::EngineConfig;
use super::context::ExecutionContext;
use super::result::{ErrorKind, ExecutionResult, NodeExecutionResult, NodeStatus};

/// Why a plugin wait ended without a plugin result
enum WaitCut {
    Cancelled,
    RunDeadline,
    AttemptTimeout,
}

/// Runs single nodes for one execution; shared by the scheduler loop
pub(super) struct NodeExecutor<'a> {
    pub config: &'a EngineConfig,
    pub registry: &'a PluginRegistry,
    pub metrics: Option<&'a MetricsCollector>,
    pub trace: Option<&'a TraceLog>,
    pub cancel: &'a CancellationToken,
    pub run_deadline: Option<Instant>,
}

impl<'a> NodeExecutor<'a> {
    /// Run one node to a terminal status. `ready_now` is the set of node
    /// ids runnable at this scheduling step, recorded in the trace.
    pub async fn run(&self, node: &TaskNode, ctx: &ExecutionContext, ready_now: &[String]) -> NodeExecutionResult {
        let start_time = epoch_ms();
        let started = Instant::now();
        if let Some(m) = self.metrics {
            m.record_node_start();
        }
        let context_before = ctx.variables_snapshot();
        let mut warnings: Vec<String> = Vec::new();

        let retry = self.effective_retry(node);
        let params = self.merged_params(node);

        let mut attempts: u32 = 0;
        let mut fallback_used = false;
        let mut outcome: ExecutionResult;

        match self.registry.resolve(&node.action) {
            Err(e) => {
                // Dispatch faults fail the node, not the run
                outcome = ExecutionResult::failure(e.to_string(), ErrorKind::System);
            }
            Ok(plugin) => {
                self.run_hook(node.before_hook.as_deref(), ctx, &mut warnings)
                    .await;

                outcome = ExecutionResult::failure("no attempt ran", ErrorKind::Unknown);
                for attempt in 0..=retry.max_retries {
                    if self.cut_reason().is_some() {
                        outcome = cancelled_result();
                        break;
                    }
                    attempts += 1;

                    let result = self.dispatch(plugin.as_ref(), ctx, &params).await;
                    match result {
                        Ok(plugin_result) => {
                            let retryable = plugin_result.is_retryable();
                            outcome = from_plugin_result(&plugin_result);
                            if plugin_result.is_success() {
                                break;
                            }
                            if retryable && attempt < retry.max_retries {
                                let delay = retry.delay_for_attempt(attempt);
                                if let Some(m) = self.metrics {
                                    m.record_retry();
                                }
                                self.trace_retry(node, attempt, retry.max_retries, delay);
                                debug!(node = %node.id, attempt, delay_ms = delay, "retrying after transient failure");
                                if !self.backoff(delay).await {
                                    outcome = cancelled_result();
                                    break;
                                }
                                continue;
                            }
                            break;
                        }
                        Err(WaitCut::AttemptTimeout) => {
                            outcome = ExecutionResult::failure(
                                format!(
                                    "plugin '{}' exceeded the attempt deadline",
                                    plugin.id()
                                ),
                                ErrorKind::Timeout,
                            );
                            if attempt < retry.max_retries {
                                let delay = retry.delay_for_attempt(attempt);
                                if let Some(m) = self.metrics {
                                    m.record_retry();
                                }
                                self.trace_retry(node, attempt, retry.max_retries, delay);
                                if !self.backoff(delay).await {
                                    outcome = cancelled_result();
                                    break;
                                }
                                continue;
                            }
                            break;
                        }
                        Err(WaitCut::Cancelled) | Err(WaitCut::RunDeadline) => {
                            outcome = cancelled_result();
                            break;
                        }
                    }
                }

                // Fallback: exactly once, after primary attempts exhaust
                let cancelled = outcome.error_type == Some(ErrorKind::Cancelled);
                if !outcome.success
                    && !cancelled
                    && self.config.enable_fallback_plugins
                {
                    if let Some(fallback_id) = &node.fallback_plugin_id {
                        match self.registry.by_id(fallback_id) {
                            Ok(fallback) => {
                                debug!(node = %node.id, fallback = %fallback_id, "dispatching fallback plugin");
                                if let Some(m) = self.metrics {
                                    m.record_fallback();
                                }
                                match self.dispatch(fallback.as_ref(), ctx, &params).await {
                                    Ok(result) if result.is_success() => {
                                        fallback_used = true;
                                        outcome = from_plugin_result(&result);
                                    }
                                    Ok(result) => {
                                        warnings.push(format!(
                                            "fallback '{}' failed: {}",
                                            fallback_id,
                                            result
                                                .error_message
                                                .as_deref()
                                                .unwrap_or("unspecified")
                                        ));
                                    }
                                    Err(_) => warnings.push(format!(
                                        "fallback '{}' cut off before completing",
                                        fallback_id
                                    )),
                                }
                            }
                            Err(e) => warnings.push(format!("fallback unresolved: {}", e)),
                        }
                    }
                }

                // After-hook runs on every exit path, warning-only
                self.run_hook(node.after_hook.as_deref(), ctx, &mut warnings)
                    .await;
            }
        }

        let status = match (outcome.success, outcome.error_type) {
            (true, _) => NodeStatus::Success,
            (false, Some(ErrorKind::Cancelled)) if attempts == 0 => NodeStatus::Skipped,
            (false, _) => NodeStatus::Failure,
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        if let Some(m) = self.metrics {
            m.record_node_complete(status.metric_name(), duration_ms);
        }

        if let Some(trace) = self.trace {
            let mut draft = TraceEventDraft::node(node.id.as_str());
            draft.enabled = ready_now.to_vec();
            draft.context_before = Some(context_before);
            draft.context_after = Some(ctx.variables_snapshot());
            draft.metadata.warnings = warnings.clone();
            draft.metadata.reason = Some(match status {
                NodeStatus::Success if fallback_used => "fallback succeeded".to_string(),
                NodeStatus::Success => format!("completed after {} attempt(s)", attempts),
                NodeStatus::Failure => outcome.message.clone(),
                NodeStatus::Skipped => "cancelled before start".to_string(),
            });
            trace.append(draft);
        }

        NodeExecutionResult {
            node_id: node.id.clone(),
            status,
            error: outcome.error.clone(),
            result: outcome,
            start_time,
            end_time: epoch_ms(),
            attempts,
            fallback_used,
        }
    }

    /// Nodes still carrying the stock policy inherit the engine defaults
    fn effective_retry(&self, node: &TaskNode) -> RetryPolicy {
        if node.retry == RetryPolicy::default() {
            RetryPolicy::new(
                self.config.default_max_retries,
                self.config.default_retry_delay_ms,
                self.config.default_backoff_multiplier,
            )
        } else {
            node.retry.clone()
        }
    }

    fn merged_params(&self, node: &TaskNode) -> Map<String, Value> {
        let mut params = node.input_params.clone();
        if !self.config.custom_properties.is_empty() {
            params.insert(
                "customProperties".to_string(),
                Value::Object(self.config.custom_properties.clone()),
            );
        }
        params
    }

    fn cut_reason(&self) -> Option<WaitCut> {
        if self.cancel.is_cancelled() {
            return Some(WaitCut::Cancelled);
        }
        if let Some(deadline) = self.run_deadline {
            if Instant::now() >= deadline {
                return Some(WaitCut::RunDeadline);
            }
        }
        None
    }

    /// Dispatch one plugin call under the attempt deadline, observing
    /// cancellation and the run deadline.
    async fn dispatch(
        &self,
        plugin: &dyn crate::plugin::Plugin,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<PluginResult, WaitCut> {
        let attempt_ms = self.config.attempt_timeout_ms();
        let started = Instant::now();
        let call = plugin.execute(ctx, params);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WaitCut::Cancelled),
            _ = wait_until(self.run_deadline) => return Err(WaitCut::RunDeadline),
            r = bounded(attempt_ms, call) => r,
        };

        match result {
            Some(mut plugin_result) => {
                if plugin_result.execution_time_ms == 0 {
                    plugin_result.execution_time_ms = started.elapsed().as_millis() as u64;
                }
                if let Some(m) = self.metrics {
                    m.record_plugin_execution(
                        &plugin_result.plugin_id,
                        plugin_result.is_success(),
                        plugin_result.execution_time_ms,
                    );
                }
                Ok(plugin_result)
            }
            None => Err(WaitCut::AttemptTimeout),
        }
    }

    /// Resolve and invoke a hook action. Failures and timeouts become
    /// warnings; nothing here can fail the node.
    async fn run_hook(
        &self,
        hook: Option<&str>,
        ctx: &ExecutionContext,
        warnings: &mut Vec<String>,
    ) {
        let Some(action) = hook else { return };
        if !self.config.enable_hooks {
            return;
        }
        let plugin = match self.registry.resolve(action) {
            Ok(p) => p,
            Err(e) => {
                warnings.push(format!("hook '{}' unresolved: {}", action, e));
                return;
            }
        };
        let hook_params = Map::new();
        let hook_call = plugin.execute(ctx, &hook_params);
        match timeout(Duration::from_millis(self.config.hook_timeout_ms), hook_call).await {
            Ok(result) if result.is_success() => {}
            Ok(result) => {
                let message = result
                    .error_message
                    .unwrap_or_else(|| "unspecified".to_string());
                warn!(hook = action, %message, "hook failed");
                warnings.push(format!("hook '{}' failed: {}", action, message));
            }
            Err(_) => {
                warn!(hook = action, "hook timed out");
                warnings.push(format!(
                    "hook '{}' exceeded {} ms",
                    action, self.config.hook_timeout_ms
                ));
            }
        }
    }

    /// Sleep the backoff delay; false when the wait was cancelled
    async fn backoff(&self, delay_ms: u64) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = wait_until(self.run_deadline) => false,
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }

    fn trace_retry(&self, node: &TaskNode, attempt: u32, max_retries: u32, delay_ms: u64) {
        if let Some(trace) = self.trace {
            let mut draft = TraceEventDraft::node(node.id.as_str());
            draft.metadata.reason = Some(format!(
                "retry {}/{} scheduled after {} ms",
                attempt + 1,
                max_retries,
                delay_ms
            ));
            trace.append(draft);
        }
    }
}

/// Future resolving at `deadline`, or never when unset
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Apply the attempt deadline; `None` on expiry, 0 means unbounded
async fn bounded<F: std::future::Future<Output = PluginResult>>(
    limit_ms: u64,
    call: F,
) -> Option<PluginResult> {
    if limit_ms == 0 {
        Some(call.await)
    } else {
        timeout(Duration::from_millis(limit_ms), call).await.ok()
    }
}

fn from_plugin_result(result: &PluginResult) -> ExecutionResult {
    if result.is_success() {
        ExecutionResult::success(
            format!("plugin '{}' succeeded", result.plugin_id),
            result.result.clone(),
        )
    } else {
        let kind = result.error_category.unwrap_or(match result.status {
            crate::plugin::PluginStatus::Timeout => ErrorKind::Timeout,
            crate::plugin::PluginStatus::Unavailable
            | crate::plugin::PluginStatus::HealthCheckFailed => ErrorKind::ResourceExhausted,
            _ => ErrorKind::Unknown,
        });
        ExecutionResult::failure(
            result
                .error_message
                .clone()
                .unwrap_or_else(|| format!("plugin '{}' failed", result.plugin_id)),
            kind,
        )
    }
}

fn cancelled_result() -> ExecutionResult {
    ExecutionResult::failure("cancelled before completion", ErrorKind::Cancelled)
}
