//! Scripted plugin: configurable per-attempt outcomes.
//!
//! The workhorse for tests and demos. Outcomes are consumed from a queue,
//! one per invocation; when the queue runs dry the plugin succeeds echoing
//! its params. `Hang` simulates a slow call so timeout paths can be
//! exercised without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::engine::result::ErrorKind;
use crate::engine::ExecutionContext;

use super::{Plugin, PluginResult};

/// One scripted invocation outcome
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed(Value),
    Fail { category: ErrorKind, message: String },
    /// Report a dispatch-level timeout immediately
    Timeout,
    Unavailable,
    /// Sleep, then succeed; lets per-attempt deadlines trip
    Hang { ms: u64 },
}

/// Test/demo plugin with a scripted outcome queue
pub struct ScriptedPlugin {
    id: String,
    actions: Vec<String>,
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    invocations: AtomicU32,
    healthy: AtomicBool,
}

impl ScriptedPlugin {
    /// A plugin that always succeeds
    pub fn succeeding<I, S>(id: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(id, actions, [])
    }

    /// A plugin with a queue of outcomes
    pub fn with_script<I, S, O>(id: impl Into<String>, actions: I, outcomes: O) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        O: IntoIterator<Item = ScriptedOutcome>,
    {
        Self {
            id: id.into(),
            actions: actions.into_iter().map(Into::into).collect(),
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            invocations: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Queue another outcome
    pub fn push_outcome(&self, outcome: ScriptedOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Invocations so far
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        _context: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> PluginResult {
        let started = Instant::now();
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let outcome = self.outcomes.lock().pop_front();
        let result = match outcome {
            None => PluginResult::success(&self.id, Some(json!({ "echo": params }))),
            Some(ScriptedOutcome::Succeed(value)) => {
                PluginResult::success(&self.id, Some(value))
            }
            Some(ScriptedOutcome::Fail { category, message }) => {
                PluginResult::failure(&self.id, category, message)
            }
            Some(ScriptedOutcome::Timeout) => PluginResult::timeout(&self.id, "scripted timeout"),
            Some(ScriptedOutcome::Unavailable) => {
                PluginResult::unavailable(&self.id, "scripted unavailable")
            }
            Some(ScriptedOutcome::Hang { ms }) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                PluginResult::success(&self.id, Some(json!({ "sleptMs": ms })))
            }
        };
        result.with_time(started.elapsed().as_millis() as u64)
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn supported_actions(&self) -> Vec<String> {
        self.actions.clone()
    }
}
