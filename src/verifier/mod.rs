//! # Formal Verifier
//!
//! Bounded reachability verification of Petri nets.
//!
//! ## Pipeline
//!
//! 1. **STRUCTURAL** — net invariants; a failure here short-circuits the
//!    report to FAIL and skips the state-space checks (reported NOT_RUN).
//! 2. One shared BFS over reachable markings (see [`explore`]) bounded by
//!    `k_bound` expansions and `max_time_ms` of wall time.
//! 3. **DEADLOCK / REACHABILITY / LIVENESS / BOUNDEDNESS** verdicts folded
//!    from the exploration's observations (see [`checks`]).
//!
//! Bound or deadline expiry never fails the pipeline: affected checks
//! report `INCONCLUSIVE_BOUND` / `INCONCLUSIVE_TIMEOUT` and the report
//! status follows. Reports are deterministic for identical inputs (modulo
//! the measured `executionTimeMs` fields).
//!
//! A `validate` call holds no shared mutable state, so distinct nets may
//! be verified from any number of threads concurrently.

pub mod checks;
pub mod explore;
pub mod report;

pub use report::{
    CheckKind, CheckResult, CheckStatus, ConfigSnapshot, CounterExample, OverallStatus,
    VerificationReport,
};

use std::collections::BTreeMap;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::error::FixSuggestion;
use crate::net::{Net, NetIndex};

use explore::{Exploration, StopReason};

// ============================================================================
// CONFIG
// ============================================================================

const CODE_BAD_BOUND: &str = "VF-120";
const CODE_BAD_DEADLINE: &str = "VF-121";

/// Invalid verifier configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("[{CODE_BAD_BOUND}] kBound must be >= 1 (got {got})")]
    BadBound { got: u64 },

    #[error("[{CODE_BAD_DEADLINE}] maxTimeMs must be > 0 (got {got})")]
    BadDeadline { got: u64 },
}

impl FixSuggestion for ConfigError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ConfigError::BadBound { .. } => Some("Use a state bound of at least 1"),
            ConfigError::BadDeadline { .. } => Some("Use a positive deadline in milliseconds"),
        }
    }
}

/// Verifier configuration. Construct with [`VerifierConfig::new`] to get
/// the validation, or use `Default` for the documented defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierConfig {
    /// Maximum number of marking expansions (default 200)
    pub k_bound: u64,
    /// Wall-clock deadline for the whole verify call (default 30 000 ms)
    pub max_time_ms: u64,
    /// Which checks run; order is irrelevant, report order is fixed
    pub enabled_checks: Vec<CheckKind>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            k_bound: 200,
            max_time_ms: 30_000,
            enabled_checks: CheckKind::all(),
        }
    }
}

impl VerifierConfig {
    /// Create a validated configuration
    pub fn new(
        k_bound: u64,
        max_time_ms: u64,
        enabled_checks: Vec<CheckKind>,
    ) -> Result<Self, ConfigError> {
        if k_bound == 0 {
            return Err(ConfigError::BadBound { got: k_bound });
        }
        if max_time_ms == 0 {
            return Err(ConfigError::BadDeadline { got: max_time_ms });
        }
        Ok(Self {
            k_bound,
            max_time_ms,
            enabled_checks,
        })
    }

    fn enabled(&self, kind: CheckKind) -> bool {
        self.enabled_checks.contains(&kind)
    }

    fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            k_bound: self.k_bound,
            max_time_ms: self.max_time_ms,
            enabled_checks: self.enabled_checks.clone(),
        }
    }
}

// ============================================================================
// VERIFIER
// ============================================================================

/// Verifies Petri nets against a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Produce a verification report for `net`.
    ///
    /// Never returns an error: structural faults and inconclusive
    /// explorations are statuses inside the report.
    pub fn verify(&self, net: &Net) -> VerificationReport {
        let config = &self.config;
        let mut checks: BTreeMap<CheckKind, CheckResult> = BTreeMap::new();
        let mut counter_example = None;
        let mut hints = Vec::new();

        // STRUCTURAL first; a failure skips the state-space pass entirely
        let structural_started = Instant::now();
        let structural_result = if config.enabled(CheckKind::Structural) {
            Some(
                checks::structural(net)
                    .with_time(structural_started.elapsed().as_millis() as u64),
            )
        } else {
            None
        };

        let structural_failed = structural_result
            .as_ref()
            .map(|r| r.status == CheckStatus::Fail)
            .unwrap_or(false);
        if let Some(result) = structural_result {
            checks.insert(CheckKind::Structural, result);
        }

        let state_space_checks: Vec<CheckKind> = [
            CheckKind::Deadlock,
            CheckKind::Reachability,
            CheckKind::Liveness,
            CheckKind::Boundedness,
        ]
        .into_iter()
        .filter(|&k| config.enabled(k))
        .collect();

        if structural_failed {
            for kind in state_space_checks {
                checks.insert(kind, CheckResult::not_run());
            }
            hints.push("Fix the structural faults before running state-space checks".to_string());
            let report = VerificationReport {
                status: OverallStatus::Fail,
                checks,
                counter_example: None,
                hints,
                config: config.snapshot(),
                states_explored: 0,
                petri_net_id: net.net_id.clone(),
            };
            info!(net = %net.net_id, "verification failed structurally");
            return report;
        }

        let mut states_explored = 0;
        let mut stop = StopReason::Exhausted;

        if !state_space_checks.is_empty() {
            let index = NetIndex::new(net);
            let exploration = Exploration::run(&index, config.k_bound, config.max_time_ms);
            states_explored = exploration.states_explored;
            stop = exploration.stop;
            let elapsed = exploration.elapsed_ms;

            for kind in state_space_checks {
                let result = match kind {
                    CheckKind::Deadlock => {
                        let (result, witness) = checks::deadlock(&exploration);
                        if counter_example.is_none() {
                            counter_example = witness;
                        }
                        result
                    }
                    CheckKind::Reachability => checks::reachability(&exploration),
                    CheckKind::Liveness => checks::liveness(&exploration, &index),
                    CheckKind::Boundedness => {
                        let (result, witness) =
                            checks::boundedness(&exploration, &index, config.k_bound);
                        if counter_example.is_none() {
                            counter_example = witness;
                        }
                        result
                    }
                    CheckKind::Structural => unreachable!("filtered above"),
                };
                checks.insert(kind, result.with_time(elapsed));
            }
        }

        let status = fold_status(&checks, stop);
        collect_hints(&mut hints, &checks, stop, states_explored, config);

        info!(
            net = %net.net_id,
            ?status,
            states_explored,
            "verification finished"
        );

        VerificationReport {
            status,
            checks,
            counter_example,
            hints,
            config: config.snapshot(),
            states_explored,
            petri_net_id: net.net_id.clone(),
        }
    }
}

/// FAIL beats inconclusive beats PASS
fn fold_status(
    checks: &BTreeMap<CheckKind, CheckResult>,
    stop: StopReason,
) -> OverallStatus {
    if checks.values().any(|r| r.status == CheckStatus::Fail) {
        return OverallStatus::Fail;
    }
    if checks.values().any(|r| r.status.is_inconclusive()) {
        return match stop {
            StopReason::TimedOut => OverallStatus::InconclusiveTimeout,
            _ => OverallStatus::InconclusiveBound,
        };
    }
    OverallStatus::Pass
}

fn collect_hints(
    hints: &mut Vec<String>,
    checks: &BTreeMap<CheckKind, CheckResult>,
    stop: StopReason,
    states_explored: u64,
    config: &VerifierConfig,
) {
    match stop {
        StopReason::BoundReached => hints.push(format!(
            "State bound reached after {} states; raise kBound (currently {}) to explore further",
            states_explored, config.k_bound
        )),
        StopReason::TimedOut => hints.push(format!(
            "Deadline of {} ms expired after {} states; raise maxTimeMs to explore further",
            config.max_time_ms, states_explored
        )),
        StopReason::Exhausted => {}
    }

    if let Some(r) = checks.get(&CheckKind::Deadlock) {
        if r.status == CheckStatus::Fail {
            hints.push(
                "A dead marking was reached; check join preconditions and token supplies"
                    .to_string(),
            );
        }
    }
    if let Some(r) = checks.get(&CheckKind::Reachability) {
        if r.status == CheckStatus::Fail {
            hints.push(
                "No done marking is reachable; make sure terminal transitions feed a p_done place"
                    .to_string(),
            );
        }
    }
    if let Some(r) = checks.get(&CheckKind::Liveness) {
        if r.status == CheckStatus::Fail {
            hints.push(
                "Transitions that are never enabled usually indicate missing arcs or unreachable branches"
                    .to_string(),
            );
        }
    }
    if let Some(r) = checks.get(&CheckKind::Boundedness) {
        if r.status == CheckStatus::Fail {
            hints.push(
                "Declare capacities for accumulating places or review producing loops".to_string(),
            );
        }
    }
}
