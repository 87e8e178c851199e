//! Engine configuration.
//!
//! One plain struct with documented defaults, validated once at
//! construction. A value of 0 for any timeout means "no limit".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EngineError;

/// Runtime options for one executor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Verbose internal logging of scheduler decisions
    pub debug_mode: bool,

    /// Applied to nodes whose retry policy is still the node default
    pub default_max_retries: u32,
    pub default_retry_delay_ms: u64,
    pub default_backoff_multiplier: f64,

    /// Deadline for the whole run; 0 = none. On breach, in-flight work is
    /// cancelled and pending nodes are skipped as CANCELLED.
    pub execution_timeout_ms: u64,
    /// Per-node ceiling; 0 = none. On breach the node fails as TIMEOUT.
    pub node_timeout_ms: u64,

    pub enable_hooks: bool,
    /// Deadline for each hook invocation
    pub hook_timeout_ms: u64,

    pub enable_fallback_plugins: bool,
    /// Per plugin attempt; 0 = none
    pub plugin_timeout_ms: u64,

    pub enable_tracing: bool,
    pub enable_metrics: bool,

    pub enable_memory_store: bool,
    /// Budget for context variables, in bytes
    pub max_context_size: usize,

    /// Passed through to plugins untouched
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub custom_properties: Map<String, Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            default_max_retries: 0,
            default_retry_delay_ms: 1000,
            default_backoff_multiplier: 1.0,
            execution_timeout_ms: 0,
            node_timeout_ms: 0,
            enable_hooks: true,
            hook_timeout_ms: 1000,
            enable_fallback_plugins: true,
            plugin_timeout_ms: 0,
            enable_tracing: true,
            enable_metrics: true,
            enable_memory_store: true,
            max_context_size: 1024 * 1024,
            custom_properties: Map::new(),
        }
    }
}

impl EngineConfig {
    /// Validate invariants that cannot be expressed in the types
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.default_backoff_multiplier < 1.0 {
            return Err(EngineError::InvalidConfig {
                field: "defaultBackoffMultiplier".to_string(),
                message: format!(
                    "must be >= 1.0 (got {})",
                    self.default_backoff_multiplier
                ),
            });
        }
        if self.max_context_size == 0 {
            return Err(EngineError::InvalidConfig {
                field: "maxContextSize".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Effective per-attempt plugin deadline: the tighter of the node and
    /// plugin timeouts, with 0 meaning unbounded.
    pub fn attempt_timeout_ms(&self) -> u64 {
        match (self.node_timeout_ms, self.plugin_timeout_ms) {
            (0, 0) => 0,
            (0, p) => p,
            (n, 0) => n,
            (n, p) => n.min(p),
        }
    }
}
