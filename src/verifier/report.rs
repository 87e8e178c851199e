//! Verification report types: per-check results, counterexamples, hints.
//!
//! The report is the verifier's only output. It never carries errors;
//! inconclusive outcomes (bound or deadline reached) are statuses, not
//! failures, and must not abort a pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::net::Marking;

// ============================================================================
// CHECK IDENTITY AND STATUS
// ============================================================================

/// The five verifier checks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckKind {
    Structural,
    Deadlock,
    Reachability,
    Liveness,
    Boundedness,
}

impl CheckKind {
    /// All checks, in report order
    pub fn all() -> Vec<CheckKind> {
        vec![
            CheckKind::Structural,
            CheckKind::Deadlock,
            CheckKind::Reachability,
            CheckKind::Liveness,
            CheckKind::Boundedness,
        ]
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckKind::Structural => "STRUCTURAL",
            CheckKind::Deadlock => "DEADLOCK",
            CheckKind::Reachability => "REACHABILITY",
            CheckKind::Liveness => "LIVENESS",
            CheckKind::Boundedness => "BOUNDEDNESS",
        };
        f.write_str(name)
    }
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// State bound hit before the check could conclude
    InconclusiveBound,
    /// Wall-clock deadline hit before the check could conclude
    InconclusiveTimeout,
    /// Skipped (structural failure short-circuits, or check disabled)
    NotRun,
}

impl CheckStatus {
    pub fn is_inconclusive(&self) -> bool {
        matches!(
            self,
            CheckStatus::InconclusiveBound | CheckStatus::InconclusiveTimeout
        )
    }
}

/// Overall report status, folded from the enabled checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Pass,
    Fail,
    InconclusiveBound,
    InconclusiveTimeout,
}

// ============================================================================
// RESULTS
// ============================================================================

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    pub execution_time_ms: u64,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
            execution_time_ms: 0,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    pub fn not_run() -> Self {
        Self::new(CheckStatus::NotRun, "not run")
    }
}

/// Witness for a failed check: a marking plus the firing path that
/// reaches it from the initial marking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterExample {
    pub failing_marking: Marking,
    /// Transitions enabled at the failing marking (empty for deadlocks)
    pub enabled_transitions: Vec<String>,
    /// Transition ids fired from the initial marking, in order
    pub path_to_failure: Vec<String>,
    pub description: String,
}

/// Snapshot of the configuration the report was produced under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub k_bound: u64,
    pub max_time_ms: u64,
    pub enabled_checks: Vec<CheckKind>,
}

// ============================================================================
// REPORT
// ============================================================================

/// Complete verification report for one net
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub status: OverallStatus,
    pub checks: BTreeMap<CheckKind, CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_example: Option<CounterExample>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    pub config: ConfigSnapshot,
    pub states_explored: u64,
    pub petri_net_id: String,
}

impl VerificationReport {
    /// True when every enabled check passed
    pub fn passed(&self) -> bool {
        self.status == OverallStatus::Pass
    }

    /// Result for one check, if it ran
    pub fn check(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.checks.get(&kind)
    }

    /// Serialize to the canonical JSON document form
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text rendering used by the CLI
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Verification of '{}': {:?}\n",
            self.petri_net_id, self.status
        ));
        out.push_str(&format!("  states explored: {}\n", self.states_explored));
        for (kind, result) in &self.checks {
            out.push_str(&format!(
                "  {:<13} {:?}: {}\n",
                kind.to_string(),
                result.status,
                result.message
            ));
            for detail in &result.details {
                out.push_str(&format!("      - {}\n", detail));
            }
        }
        if let Some(ce) = &self.counter_example {
            out.push_str(&format!("  counterexample: {}\n", ce.description));
            out.push_str(&format!("    marking: {}\n", ce.failing_marking));
            out.push_str(&format!("    path: [{}]\n", ce.path_to_failure.join(", ")));
        }
        for hint in &self.hints {
            out.push_str(&format!("  hint: {}\n", hint));
        }
        out
    }
}
