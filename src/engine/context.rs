//! Execution context: shared state for one DAG run.
//!
//! One context per execution, shared by every node in it. Variable reads
//! and writes are concurrent-safe (last committed value wins, no
//! cross-key transactions). The context references — never owns — an
//! external memory store. The variable map has a byte budget; writes that
//! would blow it are rejected, not truncated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::{InMemoryStore, MemoryStore};
use crate::trace::TraceContext;

use super::EngineError;

/// Shared state for one DAG execution
pub struct ExecutionContext {
    execution_id: String,
    variables: DashMap<String, Value>,
    metadata: DashMap<String, String>,
    /// Monotonic start of the run (never wall clock)
    started: Instant,
    store: Arc<dyn MemoryStore>,
    trace: TraceContext,
    size_budget: usize,
    size_used: AtomicUsize,
}

impl ExecutionContext {
    /// Create a context with a generated execution id and a private
    /// in-memory store
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), 1024 * 1024)
    }

    /// Create a context backed by the given store and variable budget
    pub fn with_store(store: Arc<dyn MemoryStore>, size_budget: usize) -> Self {
        Self {
            execution_id: format!("exec_{}", Uuid::new_v4().simple()),
            variables: DashMap::new(),
            metadata: DashMap::new(),
            started: Instant::now(),
            store,
            trace: TraceContext::new(),
            size_budget,
            size_used: AtomicUsize::new(0),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    /// Time since the run started (monotonic)
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Last committed value for `key`
    pub fn variable(&self, key: &str) -> Option<Value> {
        self.variables.get(key).map(|v| v.clone())
    }

    /// Write a variable, charging its serialized size against the budget
    pub fn set_variable(&self, key: &str, value: Value) -> Result<(), EngineError> {
        let new_cost = key.len() + value.to_string().len();
        let old_cost = self
            .variables
            .get(key)
            .map(|v| key.len() + v.to_string().len())
            .unwrap_or(0);

        let used = self.size_used.load(Ordering::Acquire);
        let projected = used.saturating_sub(old_cost) + new_cost;
        if projected > self.size_budget {
            return Err(EngineError::ContextOverflow {
                key: key.to_string(),
                needed: projected,
                budget: self.size_budget,
            });
        }

        self.variables.insert(key.to_string(), value);
        self.size_used.store(projected, Ordering::Release);
        Ok(())
    }

    pub fn remove_variable(&self, key: &str) {
        if let Some((k, v)) = self.variables.remove(key) {
            let cost = k.len() + v.to_string().len();
            self.size_used.fetch_sub(cost.min(self.size_used.load(Ordering::Acquire)), Ordering::AcqRel);
        }
    }

    /// Bytes currently charged against the budget
    pub fn size_used(&self) -> usize {
        self.size_used.load(Ordering::Acquire)
    }

    /// JSON object snapshot of all variables, keys sorted
    pub fn variables_snapshot(&self) -> Value {
        let mut sorted: Vec<(String, Value)> = self
            .variables
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut map = Map::new();
        for (k, v) in sorted {
            map.insert(k, v);
        }
        Value::Object(map)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn set_metadata(&self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<String> {
        self.metadata.get(key).map(|v| v.clone())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
