//! # Plugin Contract
//!
//! Tasks execute through plugins resolved by action string. The contract
//! is a tagged result, never an exception: the executor categorizes
//! outcomes from [`PluginResult`] without unwinding.
//!
//! ## Capability set
//!
//! | Capability | Purpose |
//! |------------|---------|
//! | `execute(context, params)` | run one action, return a tagged result |
//! | `health_check()` | liveness probe used by the registry |
//! | `supported_actions()` | action keys this plugin claims |
//!
//! [`WebhookPlugin`](webhook::WebhookPlugin) extends the contract with
//! signature verification and event processing.

pub mod http;
pub mod registry;
pub mod scripted;
pub mod webhook;

pub use registry::PluginRegistry;
pub use scripted::{ScriptedOutcome, ScriptedPlugin};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::result::ErrorKind;
use crate::engine::ExecutionContext;
use crate::error::FixSuggestion;

// ============================================================================
// ERROR CODES
// ============================================================================

const CODE_ACTION_CONFLICT: &str = "VF-410";
const CODE_DUPLICATE_PLUGIN: &str = "VF-411";
const CODE_UNKNOWN_ACTION: &str = "VF-412";
const CODE_UNKNOWN_PLUGIN: &str = "VF-413";

/// Registry and dispatch faults
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("[{CODE_ACTION_CONFLICT}] Action '{action}' already claimed by plugin '{existing}' (rejected '{incoming}')")]
    ActionConflict {
        action: String,
        existing: String,
        incoming: String,
    },

    #[error("[{CODE_DUPLICATE_PLUGIN}] Plugin id '{id}' is already registered")]
    DuplicatePlugin { id: String },

    #[error("[{CODE_UNKNOWN_ACTION}] No plugin claims action '{action}'")]
    UnknownAction { action: String },

    #[error("[{CODE_UNKNOWN_PLUGIN}] No plugin registered with id '{id}'")]
    UnknownPlugin { id: String },
}

impl FixSuggestion for PluginError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            PluginError::ActionConflict { .. } => {
                Some("Give each action exactly one owning plugin")
            }
            PluginError::DuplicatePlugin { .. } => Some("Use a unique plugin id"),
            PluginError::UnknownAction { .. } => {
                Some("Register a plugin whose supportedActions includes this action")
            }
            PluginError::UnknownPlugin { .. } => Some("Register the plugin before resolving it"),
        }
    }
}

// ============================================================================
// PLUGIN RESULT
// ============================================================================

/// Dispatch-level outcome of one plugin invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    Success,
    Failure,
    Timeout,
    Unavailable,
    HealthCheckFailed,
}

/// Tagged result returned by every plugin call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResult {
    pub status: PluginStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub fallback_used: bool,
    pub plugin_id: String,
}

impl PluginResult {
    pub fn success(plugin_id: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            status: PluginStatus::Success,
            result,
            error_category: None,
            error_message: None,
            execution_time_ms: 0,
            fallback_used: false,
            plugin_id: plugin_id.into(),
        }
    }

    pub fn failure(
        plugin_id: impl Into<String>,
        category: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: PluginStatus::Failure,
            result: None,
            error_category: Some(category),
            error_message: Some(message.into()),
            execution_time_ms: 0,
            fallback_used: false,
            plugin_id: plugin_id.into(),
        }
    }

    pub fn timeout(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: PluginStatus::Timeout,
            result: None,
            error_category: Some(ErrorKind::Timeout),
            error_message: Some(message.into()),
            execution_time_ms: 0,
            fallback_used: false,
            plugin_id: plugin_id.into(),
        }
    }

    pub fn unavailable(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: PluginStatus::Unavailable,
            result: None,
            error_category: Some(ErrorKind::ResourceExhausted),
            error_message: Some(message.into()),
            execution_time_ms: 0,
            fallback_used: false,
            plugin_id: plugin_id.into(),
        }
    }

    pub fn with_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == PluginStatus::Success
    }

    /// True when the executor should retry this outcome: timeouts,
    /// unavailability, failed health, and transient failure categories.
    pub fn is_retryable(&self) -> bool {
        match self.status {
            PluginStatus::Success => false,
            PluginStatus::Timeout
            | PluginStatus::Unavailable
            | PluginStatus::HealthCheckFailed => true,
            PluginStatus::Failure => self
                .error_category
                .map(|c| c.is_transient())
                .unwrap_or(false),
        }
    }
}

// ============================================================================
// PLUGIN TRAIT
// ============================================================================

/// A unit of executable behavior, dispatched by action string
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable unique id
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Execute one action with the shared context and node params
    async fn execute(&self, context: &ExecutionContext, params: &Map<String, Value>)
        -> PluginResult;

    /// Liveness probe; default healthy
    async fn health_check(&self) -> bool {
        true
    }

    /// Action keys this plugin claims
    fn supported_actions(&self) -> Vec<String>;
}
