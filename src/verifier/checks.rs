//! Verdict folding for the five checks.
//!
//! Each function turns the shared exploration's observations into one
//! `CheckResult`. The rules, shared by all four state-space checks: a
//! definite violation observed is FAIL no matter how the exploration
//! stopped; absence of a violation is PASS only under exhaustive
//! exploration, and inconclusive when the bound or deadline cut it short.

use crate::net::{Net, NetIndex};

use super::explore::{Exploration, StopReason};
use super::report::{CheckResult, CheckStatus, CounterExample};

fn inconclusive_status(stop: StopReason) -> CheckStatus {
    match stop {
        StopReason::BoundReached => CheckStatus::InconclusiveBound,
        StopReason::TimedOut => CheckStatus::InconclusiveTimeout,
        StopReason::Exhausted => CheckStatus::Pass,
    }
}

/// STRUCTURAL: net invariants, checked before any state-space work
pub fn structural(net: &Net) -> CheckResult {
    let faults = net.validate_structure();
    if faults.is_empty() {
        CheckResult::new(CheckStatus::Pass, "all structural invariants hold")
    } else {
        CheckResult::new(
            CheckStatus::Fail,
            format!("{} structural fault(s)", faults.len()),
        )
        .with_details(faults.iter().map(|f| f.to_string()).collect())
    }
}

/// DEADLOCK: no reachable dead, non-terminal marking
pub fn deadlock(
    exploration: &Exploration,
) -> (CheckResult, Option<CounterExample>) {
    if let Some(witness) = &exploration.first_deadlock {
        let path = exploration.path_to(witness);
        let counter_example = CounterExample {
            failing_marking: witness.clone(),
            enabled_transitions: Vec::new(),
            path_to_failure: path,
            description: format!(
                "marking {} has no enabled transitions and does not satisfy the done condition",
                witness
            ),
        };
        let result = CheckResult::new(
            CheckStatus::Fail,
            format!("deadlock at {}", witness),
        );
        return (result, Some(counter_example));
    }

    match exploration.stop {
        StopReason::Exhausted => (
            CheckResult::new(CheckStatus::Pass, "no deadlock reachable"),
            None,
        ),
        stop => (
            CheckResult::new(
                inconclusive_status(stop),
                "no deadlock found within the explored prefix",
            ),
            None,
        ),
    }
}

/// REACHABILITY: at least one terminal marking is reachable
pub fn reachability(exploration: &Exploration) -> CheckResult {
    if let Some(terminal) = &exploration.first_terminal {
        return CheckResult::new(
            CheckStatus::Pass,
            format!("terminal marking {} reachable", terminal),
        );
    }
    match exploration.stop {
        StopReason::Exhausted => CheckResult::new(
            CheckStatus::Fail,
            "exploration completed without reaching a terminal marking",
        ),
        stop => CheckResult::new(
            inconclusive_status(stop),
            "no terminal marking found within the explored prefix",
        ),
    }
}

/// LIVENESS: every transition is enabled in at least one reachable marking
pub fn liveness(exploration: &Exploration, index: &NetIndex<'_>) -> CheckResult {
    let dead: Vec<String> = (0..index.transition_count())
        .filter(|t| !exploration.live_transitions.contains(t))
        .map(|t| index.transition_id(t).to_string())
        .collect();

    if dead.is_empty() {
        return CheckResult::new(
            CheckStatus::Pass,
            "every transition was observed enabled",
        );
    }
    match exploration.stop {
        StopReason::Exhausted => CheckResult::new(
            CheckStatus::Fail,
            format!("{} transition(s) never enabled", dead.len()),
        )
        .with_details(dead),
        // Unobserved under bound/timeout is not proof of non-liveness
        stop => CheckResult::new(
            inconclusive_status(stop),
            format!("{} transition(s) not yet observed enabled", dead.len()),
        )
        .with_details(dead),
    }
}

/// BOUNDEDNESS: token counts stay within capacity; uncapped places are
/// held to a `k_bound / 10` growth alarm (heuristic, not a proof).
pub fn boundedness(
    exploration: &Exploration,
    index: &NetIndex<'_>,
    k_bound: u64,
) -> (CheckResult, Option<CounterExample>) {
    let heuristic_limit = (k_bound / 10).max(1);
    let mut violations: Vec<String> = Vec::new();
    let mut witness: Option<CounterExample> = None;

    for place in &index.net().places {
        let Some((observed, marking)) = exploration.token_maxima.get(&place.id) else {
            continue;
        };
        let (limit, heuristic) = match place.capacity {
            Some(capacity) => (capacity, false),
            None => (heuristic_limit, true),
        };
        if *observed > limit {
            violations.push(if heuristic {
                format!(
                    "{}: observed {} tokens, exceeds heuristic growth alarm {} (kBound/10)",
                    place.id, observed, limit
                )
            } else {
                format!(
                    "{}: observed {} tokens, capacity {}",
                    place.id, observed, limit
                )
            });
            if witness.is_none() {
                witness = Some(CounterExample {
                    failing_marking: marking.clone(),
                    enabled_transitions: index.enabled_ids(marking),
                    path_to_failure: exploration.path_to(marking),
                    description: format!(
                        "place {} holds {} tokens here (limit {})",
                        place.id, observed, limit
                    ),
                });
            }
        }
    }

    if !violations.is_empty() {
        let result = CheckResult::new(
            CheckStatus::Fail,
            format!("{} place(s) exceed their bound", violations.len()),
        )
        .with_details(violations);
        return (result, witness);
    }

    match exploration.stop {
        StopReason::Exhausted => (
            CheckResult::new(CheckStatus::Pass, "token counts stay within bounds"),
            None,
        ),
        stop => (
            CheckResult::new(
                inconclusive_status(stop),
                "no bound violation within the explored prefix",
            ),
            None,
        ),
    }
}
