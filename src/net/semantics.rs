//! Pure Petri-net semantics: enablement, firing, terminal markings.
//!
//! Everything here is side-effect free and deterministic. Transitions are
//! enumerated in net insertion order so witness paths reproduce exactly for
//! identical inputs.
//!
//! A transition `t` is enabled at marking `M` iff `M(p) >= pre(t)(p)` for
//! every input place, and firing would not push any finite-capacity output
//! place over its capacity. Firing computes `M' = M - pre(t) + post(t)`.

use std::collections::HashMap;

use super::{Marking, Net};

/// Places whose id carries this prefix mark the workflow-done condition
pub const DONE_PLACE_PREFIX: &str = "p_done";

/// Structural role tags derived from a transition's arc fan-in/out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionRole {
    /// Competes with another transition for a shared input place
    pub choice: bool,
    /// Produces into more than one place
    pub fork: bool,
    /// Consumes from more than one place
    pub join: bool,
}

impl TransitionRole {
    /// Single tag used in projector metadata, if any role applies
    pub fn label(&self) -> Option<&'static str> {
        if self.join {
            Some("join")
        } else if self.fork {
            Some("fork")
        } else if self.choice {
            Some("choice")
        } else {
            None
        }
    }
}

/// Compiled view of a [`Net`] for repeated semantic queries.
///
/// Precomputes the `pre`/`post` multisets per transition and the
/// producer/consumer sets per place. Build it once per verification,
/// projection or simulation pass; the net itself stays untouched.
pub struct NetIndex<'a> {
    net: &'a Net,
    place_index: HashMap<&'a str, usize>,
    /// pre(t): (place index, weight) pairs in arc insertion order
    pre: Vec<Vec<(usize, u64)>>,
    /// post(t): (place index, weight) pairs in arc insertion order
    post: Vec<Vec<(usize, u64)>>,
    /// transitions producing into each place, arc insertion order
    producers: Vec<Vec<usize>>,
    /// transitions consuming from each place, arc insertion order
    consumers: Vec<Vec<usize>>,
    has_done_place: bool,
}

impl<'a> NetIndex<'a> {
    /// Compile the index. Arcs with unknown endpoints are ignored here;
    /// structural validation reports them before any semantic pass runs.
    pub fn new(net: &'a Net) -> Self {
        let place_index: HashMap<&str, usize> = net
            .places
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.as_str(), i))
            .collect();
        let transition_index: HashMap<&str, usize> = net
            .transitions
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let mut pre = vec![Vec::new(); net.transitions.len()];
        let mut post = vec![Vec::new(); net.transitions.len()];
        let mut producers = vec![Vec::new(); net.places.len()];
        let mut consumers = vec![Vec::new(); net.places.len()];

        for arc in &net.arcs {
            match (
                place_index.get(arc.from_id.as_str()),
                transition_index.get(arc.to_id.as_str()),
            ) {
                (Some(&p), Some(&t)) => {
                    pre[t].push((p, arc.weight));
                    consumers[p].push(t);
                    continue;
                }
                _ => {}
            }
            if let (Some(&t), Some(&p)) = (
                transition_index.get(arc.from_id.as_str()),
                place_index.get(arc.to_id.as_str()),
            ) {
                post[t].push((p, arc.weight));
                producers[p].push(t);
            }
        }

        let has_done_place = net
            .places
            .iter()
            .any(|p| p.id.starts_with(DONE_PLACE_PREFIX));

        Self {
            net,
            place_index,
            pre,
            post,
            producers,
            consumers,
            has_done_place,
        }
    }

    pub fn net(&self) -> &'a Net {
        self.net
    }

    /// Transition ids in net insertion order
    pub fn transition_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.net.transitions.iter().map(|t| t.id.as_str())
    }

    /// Id of the transition at `index`
    pub fn transition_id(&self, index: usize) -> &'a str {
        self.net.transitions[index].id.as_str()
    }

    /// Number of transitions
    pub fn transition_count(&self) -> usize {
        self.net.transitions.len()
    }

    /// pre(t) as (place id, weight) pairs
    pub fn pre(&self, transition: usize) -> impl Iterator<Item = (&'a str, u64)> + '_ {
        self.pre[transition]
            .iter()
            .map(|&(p, w)| (self.net.places[p].id.as_str(), w))
    }

    /// post(t) as (place id, weight) pairs
    pub fn post(&self, transition: usize) -> impl Iterator<Item = (&'a str, u64)> + '_ {
        self.post[transition]
            .iter()
            .map(|&(p, w)| (self.net.places[p].id.as_str(), w))
    }

    /// Transitions producing into `place_id`, in arc insertion order
    pub fn producers_of(&self, place_id: &str) -> &[usize] {
        self.place_index
            .get(place_id)
            .map(|&p| self.producers[p].as_slice())
            .unwrap_or(&[])
    }

    /// Transitions consuming from `place_id`, in arc insertion order
    pub fn consumers_of(&self, place_id: &str) -> &[usize] {
        self.place_index
            .get(place_id)
            .map(|&p| self.consumers[p].as_slice())
            .unwrap_or(&[])
    }

    /// Whether transition `t` is enabled at `marking`
    pub fn is_enabled(&self, transition: usize, marking: &Marking) -> bool {
        for &(p, weight) in &self.pre[transition] {
            if marking.tokens(&self.net.places[p].id) < weight {
                return false;
            }
        }
        // Output capacity: firing must not overflow a bounded place
        for &(p, weight) in &self.post[transition] {
            let place = &self.net.places[p];
            if let Some(capacity) = place.capacity {
                let would_hold = marking.tokens(&place.id) + weight;
                if would_hold > capacity {
                    return false;
                }
            }
        }
        true
    }

    /// Indices of transitions enabled at `marking`, in insertion order
    pub fn enabled(&self, marking: &Marking) -> Vec<usize> {
        (0..self.net.transitions.len())
            .filter(|&t| self.is_enabled(t, marking))
            .collect()
    }

    /// Ids of transitions enabled at `marking`, in insertion order
    pub fn enabled_ids(&self, marking: &Marking) -> Vec<String> {
        self.enabled(marking)
            .into_iter()
            .map(|t| self.net.transitions[t].id.clone())
            .collect()
    }

    /// Fire `transition` at `marking`, producing the successor marking.
    ///
    /// Callers must check enablement first; firing a disabled transition
    /// would underflow and is a logic error.
    pub fn fire(&self, transition: usize, marking: &Marking) -> Marking {
        let mut next = marking.clone();
        for &(p, weight) in &self.pre[transition] {
            let id = &self.net.places[p].id;
            next = next.with_tokens(id, next.tokens(id) - weight);
        }
        for &(p, weight) in &self.post[transition] {
            let id = &self.net.places[p].id;
            next = next.with_tokens(id, next.tokens(id) + weight);
        }
        next
    }

    /// Whether `marking` satisfies the workflow-done condition.
    ///
    /// Nets that declare a `p_done`-prefixed place are done exactly when
    /// one of those places holds a token. Nets without such a place fall
    /// back to the dead-marking rule: done when nothing is enabled.
    pub fn is_terminal(&self, marking: &Marking) -> bool {
        if self.has_done_place {
            self.net
                .places
                .iter()
                .filter(|p| p.id.starts_with(DONE_PLACE_PREFIX))
                .any(|p| marking.tokens(&p.id) >= 1)
        } else {
            self.enabled(marking).is_empty()
        }
    }

    /// Whether any place carries the done prefix
    pub fn has_done_place(&self) -> bool {
        self.has_done_place
    }

    /// Structural role tags for a transition
    pub fn role(&self, transition: usize) -> TransitionRole {
        let fork = self.post[transition].len() > 1;
        let join = self.pre[transition].len() > 1;
        let choice = self.pre[transition]
            .iter()
            .any(|&(p, _)| self.consumers[p].len() > 1);
        TransitionRole { choice, fork, join }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{NetArc, Place, Transition};

    /// p_in(1) -> t_a -> p_mid -> t_b -> p_done
    fn chain_net() -> Net {
        let mut net = Net::new("net_chain");
        net.add_place(Place::new("p_in").with_capacity(1));
        net.add_place(Place::new("p_mid"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_a"));
        net.add_transition(Transition::new("t_b"));
        net.add_arc(NetArc::new("p_in", "t_a"));
        net.add_arc(NetArc::new("t_a", "p_mid"));
        net.add_arc(NetArc::new("p_mid", "t_b"));
        net.add_arc(NetArc::new("t_b", "p_done"));
        net.initial_marking = [("p_in", 1u64)].into_iter().collect();
        net
    }

    #[test]
    fn enablement_respects_preconditions() {
        let net = chain_net();
        let index = NetIndex::new(&net);
        let enabled = index.enabled_ids(&net.initial_marking);
        assert_eq!(enabled, vec!["t_a"]);
    }

    #[test]
    fn firing_moves_tokens() {
        let net = chain_net();
        let index = NetIndex::new(&net);
        let m1 = index.fire(0, &net.initial_marking);
        assert_eq!(m1.tokens("p_in"), 0);
        assert_eq!(m1.tokens("p_mid"), 1);
        assert_eq!(index.enabled_ids(&m1), vec!["t_b"]);
    }

    #[test]
    fn firing_is_pure() {
        let net = chain_net();
        let index = NetIndex::new(&net);
        let before = net.initial_marking.clone();
        let _ = index.fire(0, &net.initial_marking);
        assert_eq!(net.initial_marking, before);
    }

    #[test]
    fn fire_then_inverse_recovers_marking() {
        let net = chain_net();
        let index = NetIndex::new(&net);
        let m0 = net.initial_marking.clone();
        let m1 = index.fire(0, &m0);
        // Conceptual inverse: add pre back, remove post
        let mut recovered = m1.clone();
        for (p, w) in index.pre(0) {
            recovered = recovered.with_tokens(p, recovered.tokens(p) + w);
        }
        for (p, w) in index.post(0) {
            recovered = recovered.with_tokens(p, recovered.tokens(p) - w);
        }
        assert_eq!(recovered, m0);
    }

    #[test]
    fn capacity_blocks_producers() {
        let mut net = Net::new("net_cap");
        net.add_place(Place::new("p_src"));
        net.add_place(Place::new("p_full").with_capacity(0));
        net.add_transition(Transition::new("t_fill"));
        net.add_arc(NetArc::new("p_src", "t_fill"));
        net.add_arc(NetArc::new("t_fill", "p_full"));
        net.initial_marking = [("p_src", 1u64)].into_iter().collect();

        let index = NetIndex::new(&net);
        // Capacity 0 target: the producer can never fire
        assert!(index.enabled(&net.initial_marking).is_empty());
    }

    #[test]
    fn done_place_marks_terminal() {
        let net = chain_net();
        let index = NetIndex::new(&net);
        assert!(!index.is_terminal(&net.initial_marking));
        let done: Marking = [("p_done", 1u64)].into_iter().collect();
        assert!(index.is_terminal(&done));
    }

    #[test]
    fn dead_marking_is_terminal_only_without_done_places() {
        let mut net = Net::new("net_nodone");
        net.add_place(Place::new("p_a"));
        net.add_place(Place::new("p_b"));
        net.add_transition(Transition::new("t_x"));
        net.add_arc(NetArc::new("p_a", "t_x"));
        net.add_arc(NetArc::new("t_x", "p_b"));
        net.initial_marking = [("p_a", 1u64)].into_iter().collect();

        let index = NetIndex::new(&net);
        let dead: Marking = [("p_b", 1u64)].into_iter().collect();
        assert!(index.is_terminal(&dead));

        // With a done place declared, a dead marking elsewhere is NOT done
        let chained = chain_net();
        let chained_index = NetIndex::new(&chained);
        let stuck: Marking = [("p_in", 0u64)].into_iter().collect();
        assert!(!chained_index.is_terminal(&stuck));
    }

    #[test]
    fn roles_derive_from_fan_in_out() {
        let mut net = Net::new("net_roles");
        net.add_place(Place::new("p_start"));
        net.add_place(Place::new("p_l"));
        net.add_place(Place::new("p_r"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_fork"));
        net.add_transition(Transition::new("t_join"));
        net.add_arc(NetArc::new("p_start", "t_fork"));
        net.add_arc(NetArc::new("t_fork", "p_l"));
        net.add_arc(NetArc::new("t_fork", "p_r"));
        net.add_arc(NetArc::new("p_l", "t_join"));
        net.add_arc(NetArc::new("p_r", "t_join"));
        net.add_arc(NetArc::new("t_join", "p_done"));
        net.initial_marking = [("p_start", 1u64)].into_iter().collect();

        let index = NetIndex::new(&net);
        assert!(index.role(0).fork);
        assert!(!index.role(0).join);
        assert!(index.role(1).join);
        assert_eq!(index.role(1).label(), Some("join"));
    }

    #[test]
    fn choice_detected_on_shared_input_place() {
        let mut net = Net::new("net_choice");
        net.add_place(Place::new("p_q"));
        net.add_place(Place::new("p_a"));
        net.add_place(Place::new("p_b"));
        net.add_transition(Transition::new("t_left"));
        net.add_transition(Transition::new("t_right"));
        net.add_arc(NetArc::new("p_q", "t_left"));
        net.add_arc(NetArc::new("p_q", "t_right"));
        net.add_arc(NetArc::new("t_left", "p_a"));
        net.add_arc(NetArc::new("t_right", "p_b"));
        net.initial_marking = [("p_q", 1u64)].into_iter().collect();

        let index = NetIndex::new(&net);
        assert!(index.role(0).choice);
        assert!(index.role(1).choice);
        assert_eq!(index.role(0).label(), Some("choice"));
    }
}
