//! Bounded breadth-first exploration of the reachable marking space.
//!
//! One pass serves every state-space check: the explorer records the
//! observations each check needs (first dead non-terminal marking, first
//! terminal marking, transitions seen enabled, per-place token maxima)
//! plus parent pointers for witness-path reconstruction.
//!
//! Termination is checked between state expansions: state bound first,
//! wall-clock deadline second, exhaustion when the frontier drains. BFS
//! discovery order makes every witness path shortest-in-BFS and identical
//! across runs for identical inputs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use tracing::{debug, trace};

use crate::net::{Marking, NetIndex};

/// Why the exploration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every reachable marking (up to terminal pruning) was expanded
    Exhausted,
    /// `k_bound` expansions happened with frontier remaining
    BoundReached,
    /// The wall-clock deadline expired with frontier remaining
    TimedOut,
}

/// Everything the checks need from one exploration pass
pub struct Exploration {
    pub states_explored: u64,
    pub stop: StopReason,
    pub elapsed_ms: u64,
    /// First dead, non-terminal marking discovered (BFS order)
    pub first_deadlock: Option<Marking>,
    /// First marking satisfying the workflow-done condition
    pub first_terminal: Option<Marking>,
    /// Transition indices observed enabled in at least one marking
    pub live_transitions: HashSet<usize>,
    /// Per place: highest observed token count and a marking achieving it
    pub token_maxima: HashMap<String, (u64, Marking)>,
    /// marking -> (predecessor marking, transition id fired)
    parents: HashMap<Marking, (Marking, String)>,
    initial: Marking,
}

impl Exploration {
    /// Run the exploration for `index` under the given bound and deadline.
    pub fn run(index: &NetIndex<'_>, k_bound: u64, max_time_ms: u64) -> Self {
        let started = Instant::now();
        let initial = index.net().initial_marking.clone();

        let mut visited: HashSet<Marking> = HashSet::new();
        let mut queue: VecDeque<Marking> = VecDeque::new();
        let mut parents: HashMap<Marking, (Marking, String)> = HashMap::new();
        let mut token_maxima: HashMap<String, (u64, Marking)> = HashMap::new();
        let mut live_transitions: HashSet<usize> = HashSet::new();
        let mut first_deadlock: Option<Marking> = None;
        let mut first_terminal: Option<Marking> = None;
        let mut states_explored: u64 = 0;
        let mut stop = StopReason::Exhausted;

        record_maxima(&mut token_maxima, &initial);
        visited.insert(initial.clone());
        queue.push_back(initial.clone());

        while let Some(marking) = queue.pop_front() {
            // Termination conditions, checked between expansions
            if states_explored >= k_bound {
                stop = StopReason::BoundReached;
                debug!(states_explored, "exploration stopped: state bound reached");
                break;
            }
            if started.elapsed().as_millis() as u64 >= max_time_ms {
                stop = StopReason::TimedOut;
                debug!(states_explored, "exploration stopped: deadline expired");
                break;
            }

            states_explored += 1;
            let enabled = index.enabled(&marking);
            for &t in &enabled {
                live_transitions.insert(t);
            }

            let terminal = index.is_terminal(&marking);
            if terminal {
                if first_terminal.is_none() {
                    first_terminal = Some(marking.clone());
                }
                // The workflow is done here; successors are not explored
                continue;
            }
            if enabled.is_empty() {
                if first_deadlock.is_none() {
                    first_deadlock = Some(marking.clone());
                }
                continue;
            }

            for t in enabled {
                let next = index.fire(t, &marking);
                if visited.insert(next.clone()) {
                    trace!(from = %marking, fired = index.transition_id(t), to = %next, "discovered marking");
                    record_maxima(&mut token_maxima, &next);
                    parents.insert(
                        next.clone(),
                        (marking.clone(), index.transition_id(t).to_string()),
                    );
                    queue.push_back(next);
                }
            }
        }

        Self {
            states_explored,
            stop,
            elapsed_ms: started.elapsed().as_millis() as u64,
            first_deadlock,
            first_terminal,
            live_transitions,
            token_maxima,
            parents,
            initial,
        }
    }

    /// Firing sequence from the initial marking to `target`, reconstructed
    /// from parent pointers (empty if `target` is the initial marking).
    pub fn path_to(&self, target: &Marking) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = target;
        while current != &self.initial {
            match self.parents.get(current) {
                Some((parent, fired)) => {
                    path.push(fired.clone());
                    current = parent;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}

fn record_maxima(maxima: &mut HashMap<String, (u64, Marking)>, marking: &Marking) {
    for (place, count) in marking.iter() {
        match maxima.get(place) {
            Some((best, _)) if *best >= count => {}
            _ => {
                maxima.insert(place.to_string(), (count, marking.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Net, NetArc, Place, Transition};

    /// p_a(1) -> t_1 -> p_b -> t_2 -> p_done
    fn linear_net() -> Net {
        let mut net = Net::new("net_linear");
        net.add_place(Place::new("p_a"));
        net.add_place(Place::new("p_b"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_1"));
        net.add_transition(Transition::new("t_2"));
        net.add_arc(NetArc::new("p_a", "t_1"));
        net.add_arc(NetArc::new("t_1", "p_b"));
        net.add_arc(NetArc::new("p_b", "t_2"));
        net.add_arc(NetArc::new("t_2", "p_done"));
        net.initial_marking = [("p_a", 1u64)].into_iter().collect();
        net
    }

    #[test]
    fn exhausts_small_nets() {
        let net = linear_net();
        let index = NetIndex::new(&net);
        let exploration = Exploration::run(&index, 200, 30_000);

        assert_eq!(exploration.stop, StopReason::Exhausted);
        assert_eq!(exploration.states_explored, 3);
        assert!(exploration.first_terminal.is_some());
        assert!(exploration.first_deadlock.is_none());
        assert_eq!(exploration.live_transitions.len(), 2);
    }

    #[test]
    fn bound_of_one_explores_exactly_one_state() {
        let net = linear_net();
        let index = NetIndex::new(&net);
        let exploration = Exploration::run(&index, 1, 30_000);

        assert_eq!(exploration.states_explored, 1);
        assert_eq!(exploration.stop, StopReason::BoundReached);
    }

    #[test]
    fn witness_path_is_reconstructed_in_firing_order() {
        let net = linear_net();
        let index = NetIndex::new(&net);
        let exploration = Exploration::run(&index, 200, 30_000);

        let done = exploration.first_terminal.clone().unwrap();
        assert_eq!(exploration.path_to(&done), vec!["t_1", "t_2"]);
        assert!(exploration.path_to(&net.initial_marking).is_empty());
    }

    #[test]
    fn token_maxima_track_the_peak() {
        // t_dup consumes 1 from p_a and puts 2 into p_b
        let mut net = Net::new("net_grow");
        net.add_place(Place::new("p_a"));
        net.add_place(Place::new("p_b"));
        net.add_transition(Transition::new("t_dup"));
        net.add_arc(NetArc::new("p_a", "t_dup"));
        net.add_arc(NetArc::weighted("t_dup", "p_b", 2));
        net.initial_marking = [("p_a", 1u64)].into_iter().collect();

        let index = NetIndex::new(&net);
        let exploration = Exploration::run(&index, 200, 30_000);
        assert_eq!(exploration.token_maxima.get("p_b").unwrap().0, 2);
    }

    #[test]
    fn deadlock_recorded_with_shortest_path() {
        // p_a -> t_1 -> p_stuck, and p_done exists but is never fed
        let mut net = Net::new("net_dead");
        net.add_place(Place::new("p_a"));
        net.add_place(Place::new("p_stuck"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_1"));
        net.add_transition(Transition::new("t_never"));
        net.add_arc(NetArc::new("p_a", "t_1"));
        net.add_arc(NetArc::new("t_1", "p_stuck"));
        net.add_arc(NetArc::new("p_done", "t_never"));
        net.add_arc(NetArc::new("t_never", "p_done"));
        net.initial_marking = [("p_a", 1u64)].into_iter().collect();

        let index = NetIndex::new(&net);
        let exploration = Exploration::run(&index, 200, 30_000);

        let dead = exploration.first_deadlock.clone().unwrap();
        assert_eq!(dead.tokens("p_stuck"), 1);
        assert_eq!(exploration.path_to(&dead), vec!["t_1"]);
        assert!(exploration.first_terminal.is_none());
    }
}
