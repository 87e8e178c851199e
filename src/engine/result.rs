//! Execution result types.
//!
//! Execution-time state lives here, never on the task nodes: per-node
//! results with wall-clock timestamps, the closed error-kind taxonomy,
//! and the aggregate run summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ERROR KIND (closed taxonomy)
// ============================================================================

/// Closed classification for failures, shared by plugin results and node
/// results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Execution,
    System,
    Network,
    Auth,
    RateLimited,
    ResourceExhausted,
    Timeout,
    Cancelled,
    CircuitOpen,
    Io,
    Unknown,
}

impl ErrorKind {
    /// Kinds worth retrying: the fault may clear on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::RateLimited
                | ErrorKind::ResourceExhausted
                | ErrorKind::Io
                | ErrorKind::CircuitOpen
        )
    }
}

// ============================================================================
// EXECUTION RESULT
// ============================================================================

/// Outcome payload of one node execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
}

impl ExecutionResult {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
            error_type: None,
        }
    }

    pub fn failure(message: impl Into<String>, kind: ErrorKind) -> Self {
        let message = message.into();
        Self {
            success: false,
            message: message.clone(),
            data: None,
            error: Some(message),
            error_type: Some(kind),
        }
    }
}

// ============================================================================
// NODE RESULT
// ============================================================================

/// Terminal status of one node in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Success,
    Failure,
    Skipped,
}

impl NodeStatus {
    /// Lowercase name used for metrics labels
    pub fn metric_name(&self) -> &'static str {
        match self {
            NodeStatus::Success => "success",
            NodeStatus::Failure => "failure",
            NodeStatus::Skipped => "skipped",
        }
    }
}

/// Complete record of one node's execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub status: NodeStatus,
    pub result: ExecutionResult,
    /// Wall clock, epoch milliseconds
    pub start_time: u64,
    pub end_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Plugin attempts made (0 for skipped nodes)
    pub attempts: u32,
    pub fallback_used: bool,
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

/// Aggregate result of one DAG execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub execution_id: String,
    pub dag_id: String,
    /// Per-node results in completion order
    pub results: Vec<NodeExecutionResult>,
    pub nodes_succeeded: usize,
    pub nodes_failed: usize,
    pub nodes_skipped: usize,
    pub duration_ms: u64,
    /// True when the run ended through cancellation or the run deadline
    pub cancelled: bool,
}

impl RunSummary {
    pub fn result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.results.iter().find(|r| r.node_id == node_id)
    }

    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.result(node_id).map(|r| r.status)
    }

    /// True when every node succeeded
    pub fn all_succeeded(&self) -> bool {
        self.nodes_failed == 0 && self.nodes_skipped == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_the_retryable_ones() {
        for kind in [
            ErrorKind::Network,
            ErrorKind::RateLimited,
            ErrorKind::ResourceExhausted,
            ErrorKind::Io,
            ErrorKind::CircuitOpen,
        ] {
            assert!(kind.is_transient(), "{:?} should be transient", kind);
        }
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Auth,
            ErrorKind::Execution,
            ErrorKind::Cancelled,
            ErrorKind::Timeout,
        ] {
            assert!(!kind.is_transient(), "{:?} should not be transient", kind);
        }
    }

    #[test]
    fn error_kind_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::RateLimited).unwrap(),
            "\"RATE_LIMITED\""
        );
        assert_eq!(
            serde_json::from_str::<ErrorKind>("\"CIRCUIT_OPEN\"").unwrap(),
            ErrorKind::CircuitOpen
        );
    }

    #[test]
    fn node_result_round_trips() {
        let result = NodeExecutionResult {
            node_id: "n1".into(),
            status: NodeStatus::Failure,
            result: ExecutionResult::failure("boom", ErrorKind::Network),
            start_time: 100,
            end_time: 150,
            error: Some("boom".into()),
            attempts: 3,
            fallback_used: false,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: NodeExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
        assert!(json.contains("\"FAILURE\""));
        assert!(json.contains("\"NETWORK\""));
    }
}
