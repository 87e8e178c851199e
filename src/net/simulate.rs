//! Deterministic net simulation.
//!
//! Fires the first enabled transition (net insertion order) at each step
//! until the marking is terminal or a step limit is reached, appending one
//! trace event per firing. Identical nets produce identical traces; the
//! only randomness-looking field, `simulation_seed`, is caller-provided
//! and recorded verbatim for replay tooling.

use tracing::debug;

use crate::trace::{TraceEventDraft, TraceLog};

use super::{Marking, Net, NetIndex};

/// Result of a simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    /// Marking after the last fired transition
    pub final_marking: Marking,
    /// Transition ids fired, in order
    pub fired: Vec<String>,
    /// True if the final marking satisfies the workflow-done condition
    pub reached_terminal: bool,
    /// True if the run stopped because the step limit was hit
    pub step_limit_hit: bool,
}

/// Run the net deterministically from its initial marking.
///
/// `max_steps` bounds the run for nets with cycles. Events land in
/// `trace` with `mode: "deterministic"`; the alternatives list records the
/// enabled transitions that were not chosen at each step.
pub fn simulate(
    net: &Net,
    max_steps: usize,
    seed: Option<u64>,
    trace: &TraceLog,
) -> SimulationOutcome {
    let index = NetIndex::new(net);
    let mut marking = net.initial_marking.clone();
    let mut fired = Vec::new();

    for step in 0..max_steps {
        if index.is_terminal(&marking) {
            debug!(step, marking = %marking, "simulation reached terminal marking");
            break;
        }
        let enabled = index.enabled(&marking);
        let Some(&chosen) = enabled.first() else {
            debug!(step, marking = %marking, "simulation stuck: no enabled transition");
            break;
        };

        let next = index.fire(chosen, &marking);
        let transition_id = index.transition_id(chosen);

        let mut draft = TraceEventDraft::firing(transition_id);
        draft.from_places = index.pre(chosen).map(|(p, _)| p.to_string()).collect();
        draft.to_places = index.post(chosen).map(|(p, _)| p.to_string()).collect();
        draft.simulation_seed = seed;
        draft.enabled = enabled
            .iter()
            .map(|&t| index.transition_id(t).to_string())
            .collect();
        draft.metadata.alternatives = enabled
            .iter()
            .filter(|&&t| t != chosen)
            .map(|&t| index.transition_id(t).to_string())
            .collect();
        draft.marking_before = Some(marking.clone());
        draft.marking_after = Some(next.clone());
        trace.append(draft);

        fired.push(transition_id.to_string());
        marking = next;
    }

    let reached_terminal = index.is_terminal(&marking);
    let step_limit_hit = !reached_terminal && fired.len() == max_steps;

    SimulationOutcome {
        final_marking: marking,
        fired,
        reached_terminal,
        step_limit_hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{NetArc, Place, Transition};

    fn pipeline_net() -> Net {
        let mut net = Net::new("net_sim");
        net.add_place(Place::new("p_start").with_capacity(1));
        net.add_place(Place::new("p_mid"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_first"));
        net.add_transition(Transition::new("t_second"));
        net.add_arc(NetArc::new("p_start", "t_first"));
        net.add_arc(NetArc::new("t_first", "p_mid"));
        net.add_arc(NetArc::new("p_mid", "t_second"));
        net.add_arc(NetArc::new("t_second", "p_done"));
        net.initial_marking = [("p_start", 1u64)].into_iter().collect();
        net
    }

    #[test]
    fn runs_to_terminal_marking() {
        let net = pipeline_net();
        let trace = TraceLog::new();
        let outcome = simulate(&net, 100, None, &trace);

        assert!(outcome.reached_terminal);
        assert!(!outcome.step_limit_hit);
        assert_eq!(outcome.fired, vec!["t_first", "t_second"]);
        assert_eq!(outcome.final_marking.tokens("p_done"), 1);
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn trace_records_markings_around_each_firing() {
        let net = pipeline_net();
        let trace = TraceLog::new();
        simulate(&net, 100, Some(7), &trace);

        let events = trace.events();
        assert_eq!(events[0].transition.as_deref(), Some("t_first"));
        assert_eq!(events[0].simulation_seed, Some(7));
        assert_eq!(
            events[0].marking_before.as_ref().unwrap().tokens("p_start"),
            1
        );
        assert_eq!(events[0].marking_after.as_ref().unwrap().tokens("p_mid"), 1);
        assert_eq!(events[0].from_places, vec!["p_start"]);
        assert_eq!(events[0].to_places, vec!["p_mid"]);
    }

    #[test]
    fn step_limit_stops_cyclic_nets() {
        // p_loop -> t_spin -> p_loop: fires forever without a limit
        let mut net = Net::new("net_loop");
        net.add_place(Place::new("p_loop"));
        net.add_transition(Transition::new("t_spin"));
        net.add_arc(NetArc::new("p_loop", "t_spin"));
        net.add_arc(NetArc::new("t_spin", "p_loop"));
        net.initial_marking = [("p_loop", 1u64)].into_iter().collect();

        let trace = TraceLog::new();
        let outcome = simulate(&net, 5, None, &trace);
        assert!(outcome.step_limit_hit);
        assert_eq!(outcome.fired.len(), 5);
    }

    #[test]
    fn identical_runs_fire_identically() {
        let net = pipeline_net();
        let t1 = TraceLog::new();
        let t2 = TraceLog::new();
        let a = simulate(&net, 100, None, &t1);
        let b = simulate(&net, 100, None, &t2);
        assert_eq!(a, b);
    }
}
