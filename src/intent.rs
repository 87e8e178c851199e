//! # Intent Spec Boundary
//!
//! The parser that produces an [`IntentSpec`] is external; this module
//! consumes the spec and deterministically builds the Petri net the rest
//! of the pipeline verifies, projects and executes.
//!
//! ## Construction rules
//!
//! - one transition `t_<id>` per step, in step order
//! - steps without dependencies get a seeded entry place `p_start_<id>`
//! - each dependency edge `d -> s` gets a buffer place `p_<d>_<s>`
//!   (single producer, single consumer: projection recovers the edge)
//! - a `choice` step gets one shared output place `p_<id>_choice` that
//!   all of its dependents compete for
//! - steps nothing depends on feed a shared `p_done` sink
//!
//! `parallel` and `sync` need no special construction: multiple buffer
//! places out of or into a transition already are fork and join.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::error::FixSuggestion;
use crate::net::{is_valid_id, Marking, Net, NetArc, Place, Transition};

// ============================================================================
// ERROR CODES
// ============================================================================

const CODE_BAD_VERSION: &str = "VF-150";
const CODE_NO_STEPS: &str = "VF-151";
const CODE_BAD_STEP_ID: &str = "VF-152";
const CODE_DUPLICATE_STEP: &str = "VF-153";
const CODE_UNKNOWN_DEPENDENCY: &str = "VF-154";

/// Faults in an intent spec document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntentError {
    #[error("[{CODE_BAD_VERSION}] Unsupported schemaVersion '{got}' (expected '1.0')")]
    BadVersion { got: String },

    #[error("[{CODE_NO_STEPS}] Intent '{name}' has no steps")]
    NoSteps { name: String },

    #[error("[{CODE_BAD_STEP_ID}] steps[{index}].id: invalid id '{id}'")]
    BadStepId { index: usize, id: String },

    #[error("[{CODE_DUPLICATE_STEP}] steps[{index}].id: duplicate step id '{id}'")]
    DuplicateStep { index: usize, id: String },

    #[error("[{CODE_UNKNOWN_DEPENDENCY}] steps[{index}] ('{step}') depends on unknown step '{dependency}'")]
    UnknownDependency {
        index: usize,
        step: String,
        dependency: String,
    },
}

impl FixSuggestion for IntentError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            IntentError::BadVersion { .. } => Some("Use schemaVersion \"1.0\""),
            IntentError::NoSteps { .. } => Some("Describe at least one step"),
            IntentError::BadStepId { .. } => {
                Some("Step ids are 1-64 chars of [A-Za-z0-9_.-]")
            }
            IntentError::DuplicateStep { .. } => Some("Make every step id unique"),
            IntentError::UnknownDependency { .. } => {
                Some("Reference only step ids declared in this spec")
            }
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// Kind of one workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Action,
    Choice,
    Parallel,
    Sync,
}

/// One step of an intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStep {
    pub id: String,
    #[serde(rename = "type", default = "default_step_type")]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Opaque guard inputs, stored on the transition
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub conditions: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

fn default_step_type() -> StepType {
    StepType::Action
}

/// Parsed workflow intent (produced by the external parser)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSpec {
    #[serde(default = "IntentSpec::schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<IntentStep>,
}

impl IntentSpec {
    pub fn schema_version() -> String {
        "1.0".to_string()
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&raw)?),
            _ => Ok(serde_json::from_str(&raw)?),
        }
    }

    fn validate(&self) -> Result<(), IntentError> {
        if self.schema_version != "1.0" {
            return Err(IntentError::BadVersion {
                got: self.schema_version.clone(),
            });
        }
        if self.steps.is_empty() {
            return Err(IntentError::NoSteps {
                name: self.name.clone(),
            });
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if !is_valid_id(&step.id) {
                return Err(IntentError::BadStepId {
                    index,
                    id: step.id.clone(),
                });
            }
            if !seen.insert(&step.id) {
                return Err(IntentError::DuplicateStep {
                    index,
                    id: step.id.clone(),
                });
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(IntentError::UnknownDependency {
                        index,
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build the Petri net realizing this intent
    pub fn build_net(&self) -> Result<Net, IntentError> {
        self.validate()?;

        let mut net = Net::new(format!("net_{}", slug(&self.name)));
        net.name = Some(self.name.clone());
        net.description = self.description.clone();
        let mut marking = Marking::empty();

        let has_dependents: HashSet<&str> = self
            .steps
            .iter()
            .flat_map(|s| s.dependencies.iter().map(|d| d.as_str()))
            .collect();
        let choice_steps: HashSet<&str> = self
            .steps
            .iter()
            .filter(|s| s.step_type == StepType::Choice)
            .map(|s| s.id.as_str())
            .collect();

        // Transitions, one per step, in step order
        for step in &self.steps {
            let mut transition = Transition::new(format!("t_{}", step.id));
            transition.name = step.description.clone();
            transition.action = step
                .metadata
                .get("action")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(step.id.clone()));
            if !step.conditions.is_empty() {
                transition.guard =
                    serde_json::to_string(&Value::Object(step.conditions.clone())).ok();
            }
            transition.metadata = step.metadata.clone();
            net.add_transition(transition);
        }

        // Shared output place per choice step; its dependents compete
        for step in self.steps.iter().filter(|s| choice_steps.contains(s.id.as_str())) {
            let place_id = format!("p_{}_choice", step.id);
            net.add_place(Place::new(place_id.as_str()));
            net.add_arc(NetArc::new(format!("t_{}", step.id), place_id.as_str()));
        }

        for step in &self.steps {
            // Entry places, seeded with one token
            if step.dependencies.is_empty() {
                let place_id = format!("p_start_{}", step.id);
                net.add_place(Place::new(place_id.as_str()).with_capacity(1));
                net.add_arc(NetArc::new(place_id.as_str(), format!("t_{}", step.id)));
                marking.set(&place_id, 1);
            }
            // Buffer place per dependency edge (choice deps share theirs)
            for dep in &step.dependencies {
                if choice_steps.contains(dep.as_str()) {
                    net.add_arc(NetArc::new(
                        format!("p_{}_choice", dep),
                        format!("t_{}", step.id),
                    ));
                } else {
                    let place_id = format!("p_{}_{}", dep, step.id);
                    net.add_place(Place::new(place_id.as_str()));
                    net.add_arc(NetArc::new(format!("t_{}", dep), place_id.as_str()));
                    net.add_arc(NetArc::new(place_id.as_str(), format!("t_{}", step.id)));
                }
            }
        }

        // Terminal steps feed the shared done sink
        net.add_place(Place::new("p_done"));
        for step in &self.steps {
            if !has_dependents.contains(step.id.as_str()) {
                net.add_arc(NetArc::new(format!("t_{}", step.id), "p_done"));
            }
        }

        net.initial_marking = marking;
        debug!(
            intent = %self.name,
            places = net.places.len(),
            transitions = net.transitions.len(),
            "intent compiled to net"
        );
        Ok(net)
    }
}

/// Lowercase alphanumeric slug with underscores
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "intent".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetIndex;

    fn step(id: &str, deps: &[&str]) -> IntentStep {
        IntentStep {
            id: id.to_string(),
            step_type: StepType::Action,
            description: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            conditions: Map::new(),
            metadata: Map::new(),
        }
    }

    fn spec(steps: Vec<IntentStep>) -> IntentSpec {
        IntentSpec {
            schema_version: "1.0".to_string(),
            name: "Release Train".to_string(),
            description: None,
            steps,
        }
    }

    #[test]
    fn linear_intent_builds_a_sound_net() {
        let spec = spec(vec![step("fetch", &[]), step("build", &["fetch"])]);
        let net = spec.build_net().unwrap();

        assert_eq!(net.net_id, "net_release_train");
        assert!(net.validate_structure().is_empty());
        assert_eq!(net.initial_marking.tokens("p_start_fetch"), 1);

        let index = NetIndex::new(&net);
        assert_eq!(index.enabled_ids(&net.initial_marking), vec!["t_fetch"]);
    }

    #[test]
    fn terminal_steps_feed_the_done_sink() {
        let spec = spec(vec![step("a", &[]), step("b", &["a"]), step("c", &["a"])]);
        let net = spec.build_net().unwrap();
        let index = NetIndex::new(&net);
        // b and c are terminal: both produce into p_done
        assert_eq!(index.producers_of("p_done").len(), 2);
    }

    #[test]
    fn choice_steps_share_one_output_place() {
        let mut choice = step("decide", &[]);
        choice.step_type = StepType::Choice;
        let spec = spec(vec![
            choice,
            step("left", &["decide"]),
            step("right", &["decide"]),
        ]);
        let net = spec.build_net().unwrap();
        let index = NetIndex::new(&net);
        assert_eq!(index.consumers_of("p_decide_choice").len(), 2);
        // Competing consumers: firing one disables the other
        let after_decide = index.fire(0, &net.initial_marking);
        assert_eq!(
            index.enabled_ids(&after_decide),
            vec!["t_left", "t_right"]
        );
        let after_left = index.fire(1, &after_decide);
        assert!(!index.enabled_ids(&after_left).contains(&"t_right".to_string()));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let spec = spec(vec![step("a", &["ghost"])]);
        assert!(matches!(
            spec.build_net(),
            Err(IntentError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn duplicate_and_invalid_ids_are_rejected() {
        let spec_dup = spec(vec![step("a", &[]), step("a", &[])]);
        assert!(matches!(
            spec_dup.build_net(),
            Err(IntentError::DuplicateStep { .. })
        ));

        let spec_bad = spec(vec![step("bad id!", &[])]);
        assert!(matches!(
            spec_bad.build_net(),
            Err(IntentError::BadStepId { .. })
        ));
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let mut s = spec(vec![step("a", &[])]);
        s.schema_version = "2.0".to_string();
        assert!(matches!(s.build_net(), Err(IntentError::BadVersion { .. })));
    }

    #[test]
    fn spec_round_trips_through_json_and_yaml() {
        let s = spec(vec![step("a", &[]), step("b", &["a"])]);
        let json = serde_json::to_string(&s).unwrap();
        let from_json: IntentSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(s, from_json);

        let yaml = serde_yaml::to_string(&s).unwrap();
        let from_yaml: IntentSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(s, from_yaml);
    }
}
