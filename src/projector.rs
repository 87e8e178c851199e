//! # Petri → DAG Projector
//!
//! Derives the executable DAG from a verified net.
//!
//! One task node per transition (node id = transition id, so the two views
//! cross-highlight). Edges come from the single-producer rule: a place
//! with exactly one producing transition `u` yields an edge `u -> v` for
//! each of its consumers `v`, so choice fan-out projects onto parallel
//! branches. Places with several producers (or none) produce no edges;
//! ordering correctness for such nets rests on the verifier's guarantees.
//! A transitive reduction (Floyd-Warshall reachability) then drops edges
//! implied by longer paths, with lexicographic (from, to) ordering making
//! the output deterministic.
//!
//! The projection is an approximation intended for small nets; it is
//! idempotent at the DAG level when re-invoked on the same net.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::dag::{Dag, TaskNode};
use crate::error::FixSuggestion;
use crate::net::{Net, NetIndex};

// ============================================================================
// ERRORS
// ============================================================================

const CODE_INVALID_NET: &str = "VF-301";
const CODE_NO_TRANSITIONS: &str = "VF-302";
const CODE_CYCLIC_RESULT: &str = "VF-303";

/// Fatal construction faults: the projector cannot produce a usable DAG
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("[{CODE_INVALID_NET}] Net '{net_id}' has {fault_count} structural fault(s); verify before projecting")]
    InvalidNet { net_id: String, fault_count: usize },

    #[error("[{CODE_NO_TRANSITIONS}] Net '{net_id}' has no transitions to project")]
    NoTransitions { net_id: String },

    #[error("[{CODE_CYCLIC_RESULT}] Projection of net '{net_id}' is cyclic; the net is outside the single-producer/single-consumer fragment")]
    CyclicResult { net_id: String },
}

impl FixSuggestion for ProjectionError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ProjectionError::InvalidNet { .. } => {
                Some("Run verification and fix the structural faults first")
            }
            ProjectionError::NoTransitions { .. } => {
                Some("Add transitions; places alone cannot be executed")
            }
            ProjectionError::CyclicResult { .. } => {
                Some("Restructure looping places, or execute from a hand-written DAG")
            }
        }
    }
}

/// Algorithm tag recorded in projector output metadata
pub const PROJECTION_ALGORITHM: &str = "single-producer-consumer";

// ============================================================================
// PROJECTION
// ============================================================================

/// Project a verified net onto an executable DAG.
pub fn project(net: &Net) -> Result<Dag, ProjectionError> {
    let faults = net.validate_structure();
    if !faults.is_empty() {
        return Err(ProjectionError::InvalidNet {
            net_id: net.net_id.clone(),
            fault_count: faults.len(),
        });
    }
    if net.transitions.is_empty() {
        return Err(ProjectionError::NoTransitions {
            net_id: net.net_id.clone(),
        });
    }

    let index = NetIndex::new(net);
    let transition_pos: HashMap<&str, usize> = net
        .transitions
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    // Single-producer edges, keyed lexicographically; each edge remembers
    // the place(s) that induced it
    let mut edges: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for place in &net.places {
        let producers = index.producers_of(&place.id);
        if producers.len() != 1 {
            continue;
        }
        let from = index.transition_id(producers[0]);
        for &consumer in index.consumers_of(&place.id) {
            let to = index.transition_id(consumer);
            if from == to {
                // A self-loop place orders nothing
                continue;
            }
            edges
                .entry((from.to_string(), to.to_string()))
                .or_default()
                .push(place.id.clone());
        }
    }

    // Reachability over the raw edge set (Floyd-Warshall)
    let n = net.transitions.len();
    let mut reach = vec![vec![false; n]; n];
    for (from, to) in edges.keys() {
        reach[transition_pos[from.as_str()]][transition_pos[to.as_str()]] = true;
    }
    for k in 0..n {
        for i in 0..n {
            if reach[i][k] {
                for j in 0..n {
                    if reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
    }

    // Transitive reduction: drop u -> v when some neighbor w of u still
    // reaches v. Lexicographic edge order keeps the output deterministic.
    let mut reduced: Vec<(&(String, String), &Vec<String>)> = Vec::new();
    for (edge, places) in &edges {
        let (u, v) = (
            transition_pos[edge.0.as_str()],
            transition_pos[edge.1.as_str()],
        );
        let redundant = edges.keys().any(|(from, mid)| {
            if from != &edge.0 || mid == &edge.1 {
                return false;
            }
            let w = transition_pos[mid.as_str()];
            w != u && reach[w][v]
        });
        if redundant {
            debug!(from = %edge.0, to = %edge.1, "dropping transitively implied edge");
        } else {
            reduced.push((edge, places));
        }
    }

    // Nodes, one per transition, in net insertion order
    let mut dag = Dag::new(format!("{}_dag", net.net_id));
    dag.derived_from_petri_net_id = Some(net.net_id.clone());
    dag.metadata.insert(
        "projectionAlgorithm".to_string(),
        Value::String(PROJECTION_ALGORITHM.to_string()),
    );

    for (i, transition) in net.transitions.iter().enumerate() {
        let action = transition
            .action
            .clone()
            .or_else(|| transition.name.clone())
            .unwrap_or_else(|| "execute".to_string());
        let mut node = TaskNode::new(transition.id.as_str(), action);
        node.metadata = transition.metadata.clone();
        node.metadata.insert(
            "petriTransitionId".to_string(),
            Value::String(transition.id.clone()),
        );
        if let Some(name) = &transition.name {
            node.metadata
                .insert("petriTransitionName".to_string(), Value::String(name.clone()));
        }
        if let Some(role) = index.role(i).label() {
            node.metadata
                .insert("executionType".to_string(), Value::String(role.to_string()));
        }
        dag.add_node(node);
    }

    // Dependencies from the reduced edge set, lexicographic edge order
    for ((from, to), _) in &reduced {
        let node = dag
            .node_mut(to)
            .expect("every edge endpoint is a projected node");
        if !node.dependency_ids.contains(from) {
            node.dependency_ids.push(from.clone());
        }
    }

    // Edge list with inducing places, for UI cross-highlighting
    let edge_values: Vec<Value> = reduced
        .iter()
        .map(|((from, to), places)| {
            json!({ "from": from, "to": to, "places": places })
        })
        .collect();
    dag.metadata
        .insert("edges".to_string(), Value::Array(edge_values));

    // Root: no-incoming-edge candidates, else initially enabled
    // transitions; lexicographic first
    let mut candidates: Vec<&str> = dag
        .nodes
        .iter()
        .filter(|node| node.dependency_ids.is_empty())
        .map(|node| node.id.as_str())
        .collect();
    if candidates.is_empty() {
        candidates = index
            .enabled(&net.initial_marking)
            .into_iter()
            .map(|t| index.transition_id(t))
            .collect();
    }
    candidates.sort_unstable();
    dag.root_node = candidates.first().map(|s| s.to_string());

    if dag.rebuild_links().topological_order().is_none() {
        return Err(ProjectionError::CyclicResult {
            net_id: net.net_id.clone(),
        });
    }

    debug!(
        net = %net.net_id,
        nodes = dag.nodes.len(),
        edges = reduced.len(),
        root = dag.root_node.as_deref().unwrap_or("-"),
        "projection complete"
    );
    Ok(dag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{NetArc, Place, Transition};

    /// p_a(1) -> t_first -> p_ab -> t_second -> p_done
    fn pipeline() -> Net {
        let mut net = Net::new("net_pipe");
        net.add_place(Place::new("p_a").with_capacity(1));
        net.add_place(Place::new("p_ab"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_first").with_action("fetch"));
        net.add_transition(Transition::new("t_second"));
        net.add_arc(NetArc::new("p_a", "t_first"));
        net.add_arc(NetArc::new("t_first", "p_ab"));
        net.add_arc(NetArc::new("p_ab", "t_second"));
        net.add_arc(NetArc::new("t_second", "p_done"));
        net.initial_marking = [("p_a", 1u64)].into_iter().collect();
        net
    }

    #[test]
    fn nodes_mirror_transitions() {
        let dag = project(&pipeline()).unwrap();
        assert_eq!(dag.nodes.len(), 2);
        assert_eq!(dag.nodes[0].id, "t_first");
        assert_eq!(dag.nodes[0].action, "fetch");
        // No action and no name falls back to the execute literal
        assert_eq!(dag.nodes[1].action, "execute");
        assert_eq!(
            dag.nodes[0].metadata["petriTransitionId"],
            Value::String("t_first".into())
        );
        assert_eq!(dag.derived_from_petri_net_id.as_deref(), Some("net_pipe"));
        assert_eq!(
            dag.metadata["projectionAlgorithm"],
            Value::String(PROJECTION_ALGORITHM.into())
        );
    }

    #[test]
    fn single_producer_consumer_places_become_edges() {
        let dag = project(&pipeline()).unwrap();
        assert_eq!(dag.nodes[1].dependency_ids, vec!["t_first"]);
        assert_eq!(dag.root_node.as_deref(), Some("t_first"));
        let edges = dag.metadata["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0]["places"], json!(["p_ab"]));
    }

    #[test]
    fn choice_fan_out_projects_one_edge_per_consumer() {
        // p_shared: one producer, two consumers -> two edges
        let mut net = pipeline();
        net.add_place(Place::new("p_shared"));
        net.add_transition(Transition::new("t_alt"));
        net.add_arc(NetArc::new("t_first", "p_shared"));
        net.add_arc(NetArc::new("p_shared", "t_second"));
        net.add_arc(NetArc::new("p_shared", "t_alt"));
        net.add_arc(NetArc::new("t_alt", "p_done"));

        let dag = project(&net).unwrap();
        assert_eq!(dag.node("t_second").unwrap().dependency_ids, vec!["t_first"]);
        assert_eq!(dag.node("t_alt").unwrap().dependency_ids, vec!["t_first"]);
        // The p_shared edge carries its inducing places
        let edges = dag.metadata["edges"].as_array().unwrap();
        let alt_edge = edges
            .iter()
            .find(|e| e["to"] == json!("t_alt"))
            .unwrap();
        assert_eq!(alt_edge["places"], json!(["p_shared"]));
    }

    #[test]
    fn multi_producer_places_produce_no_edges() {
        // p_merge has two producers: no ordering can be derived from it
        let mut net = pipeline();
        net.add_place(Place::new("p_merge"));
        net.add_transition(Transition::new("t_sink"));
        net.add_arc(NetArc::new("t_first", "p_merge"));
        net.add_arc(NetArc::new("t_second", "p_merge"));
        net.add_arc(NetArc::new("p_merge", "t_sink"));
        net.add_arc(NetArc::new("t_sink", "p_done"));

        let dag = project(&net).unwrap();
        assert!(dag.node("t_sink").unwrap().dependency_ids.is_empty());
    }

    #[test]
    fn transitive_reduction_drops_implied_edges() {
        // a -> b, b -> c, and a direct a -> c shortcut place
        let mut net = Net::new("net_tr");
        net.add_place(Place::new("p_start").with_capacity(1));
        net.add_place(Place::new("p_ab"));
        net.add_place(Place::new("p_bc"));
        net.add_place(Place::new("p_ac"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_a"));
        net.add_transition(Transition::new("t_b"));
        net.add_transition(Transition::new("t_c"));
        net.add_arc(NetArc::new("p_start", "t_a"));
        net.add_arc(NetArc::new("t_a", "p_ab"));
        net.add_arc(NetArc::new("p_ab", "t_b"));
        net.add_arc(NetArc::new("t_b", "p_bc"));
        net.add_arc(NetArc::new("p_bc", "t_c"));
        net.add_arc(NetArc::new("t_a", "p_ac"));
        net.add_arc(NetArc::new("p_ac", "t_c"));
        net.add_arc(NetArc::new("t_c", "p_done"));
        net.initial_marking = [("p_start", 1u64)].into_iter().collect();

        let dag = project(&net).unwrap();
        // t_c depends on t_b only; t_a -> t_c is implied via t_b
        assert_eq!(dag.node("t_c").unwrap().dependency_ids, vec!["t_b"]);
        assert_eq!(dag.node("t_b").unwrap().dependency_ids, vec!["t_a"]);
    }

    #[test]
    fn fork_and_join_tagged_in_metadata() {
        let mut net = Net::new("net_fj");
        net.add_place(Place::new("p_start").with_capacity(1));
        net.add_place(Place::new("p_l"));
        net.add_place(Place::new("p_r"));
        net.add_place(Place::new("p_ld"));
        net.add_place(Place::new("p_rd"));
        net.add_place(Place::new("p_done"));
        net.add_transition(Transition::new("t_fork"));
        net.add_transition(Transition::new("t_l"));
        net.add_transition(Transition::new("t_r"));
        net.add_transition(Transition::new("t_join"));
        net.add_arc(NetArc::new("p_start", "t_fork"));
        net.add_arc(NetArc::new("t_fork", "p_l"));
        net.add_arc(NetArc::new("t_fork", "p_r"));
        net.add_arc(NetArc::new("p_l", "t_l"));
        net.add_arc(NetArc::new("t_l", "p_ld"));
        net.add_arc(NetArc::new("p_r", "t_r"));
        net.add_arc(NetArc::new("t_r", "p_rd"));
        net.add_arc(NetArc::new("p_ld", "t_join"));
        net.add_arc(NetArc::new("p_rd", "t_join"));
        net.add_arc(NetArc::new("t_join", "p_done"));
        net.initial_marking = [("p_start", 1u64)].into_iter().collect();

        let dag = project(&net).unwrap();
        assert_eq!(
            dag.node("t_fork").unwrap().metadata["executionType"],
            Value::String("fork".into())
        );
        assert_eq!(
            dag.node("t_join").unwrap().metadata["executionType"],
            Value::String("join".into())
        );
        assert_eq!(
            dag.node("t_join").unwrap().dependency_ids,
            vec!["t_l", "t_r"]
        );
    }

    #[test]
    fn projection_is_idempotent() {
        let net = pipeline();
        let a = project(&net).unwrap();
        let b = project(&net).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_net_is_a_construction_error() {
        let mut net = pipeline();
        net.add_arc(NetArc::new("p_a", "p_done"));
        assert!(matches!(
            project(&net),
            Err(ProjectionError::InvalidNet { .. })
        ));
    }
}
