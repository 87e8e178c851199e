//! # Petri Net Model
//!
//! The net is the source of truth for workflow correctness. It owns its
//! places, transitions and arcs in insertion order (enumeration order is
//! part of the public contract: counterexample paths must be reproducible),
//! plus one initial marking.
//!
//! ## Document format
//!
//! ```json
//! {
//!   "schemaVersion": "1.0",
//!   "netId": "net_cicd",
//!   "name": "CI/CD pipeline",
//!   "places": [{ "id": "p_code", "capacity": 1 }],
//!   "transitions": [{ "id": "t_run", "action": "run_tests" }],
//!   "arcs": [{ "fromId": "p_code", "toId": "t_run", "weight": 1 }],
//!   "initialMarking": { "p_code": 1 }
//! }
//! ```
//!
//! Documents are checked against an embedded JSON Schema before
//! deserialization; structural invariants (bipartite arcs, known endpoints,
//! connectivity) are checked by [`Net::validate_structure`], which is also
//! what the verifier's STRUCTURAL check runs.

mod marking;
pub mod semantics;
pub mod simulate;

pub use marking::Marking;
pub use semantics::{NetIndex, TransitionRole};
pub use simulate::{simulate, SimulationOutcome};

use std::collections::HashSet;
use std::path::Path;

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::error::FixSuggestion;

// ============================================================================
// ERROR CODES
// ============================================================================

const CODE_SCHEMA: &str = "VF-101";
const CODE_INVALID_ID: &str = "VF-102";
const CODE_DUPLICATE_ID: &str = "VF-103";
const CODE_UNKNOWN_ENDPOINT: &str = "VF-104";
const CODE_NOT_BIPARTITE: &str = "VF-105";
const CODE_ZERO_WEIGHT: &str = "VF-106";
const CODE_EMPTY_NET: &str = "VF-107";
const CODE_EMPTY_MARKING: &str = "VF-108";
const CODE_UNKNOWN_MARKING_PLACE: &str = "VF-109";
const CODE_DISCONNECTED: &str = "VF-110";

// ============================================================================
// ERRORS
// ============================================================================

/// Structural faults in a Petri-net document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    #[error("[{CODE_SCHEMA}] Net document rejected by schema: {details}")]
    Schema { details: String },

    #[error("[{CODE_INVALID_ID}] Invalid id '{id}': ids are 1-64 chars of [A-Za-z0-9_.-]")]
    InvalidId { id: String },

    #[error("[{CODE_DUPLICATE_ID}] Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("[{CODE_UNKNOWN_ENDPOINT}] Arc {from} -> {to} references unknown id '{unknown}'")]
    UnknownEndpoint {
        from: String,
        to: String,
        unknown: String,
    },

    #[error("[{CODE_NOT_BIPARTITE}] Arc {from} -> {to} does not connect a place and a transition")]
    NotBipartite { from: String, to: String },

    #[error("[{CODE_ZERO_WEIGHT}] Arc {from} -> {to} has weight 0; weights must be >= 1")]
    ZeroWeight { from: String, to: String },

    #[error("[{CODE_EMPTY_NET}] Net has no {kind}")]
    Empty { kind: &'static str },

    #[error("[{CODE_EMPTY_MARKING}] Initial marking is empty")]
    EmptyInitialMarking,

    #[error("[{CODE_UNKNOWN_MARKING_PLACE}] Initial marking references unknown place '{place_id}'")]
    UnknownMarkingPlace { place_id: String },

    #[error("[{CODE_DISCONNECTED}] {kind} '{id}' is not connected to any arc")]
    Disconnected { kind: &'static str, id: String },
}

impl FixSuggestion for NetError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            NetError::Schema { .. } => Some("Compare the document with the net JSON format"),
            NetError::InvalidId { .. } => {
                Some("Rename the id to alphanumerics, '_', '-' or '.'")
            }
            NetError::DuplicateId { .. } => Some("Make every id unique within the net"),
            NetError::UnknownEndpoint { .. } => {
                Some("Declare the referenced place or transition before using it in an arc")
            }
            NetError::NotBipartite { .. } => {
                Some("Arcs must alternate place -> transition or transition -> place")
            }
            NetError::ZeroWeight { .. } => Some("Use a weight of 1 or more"),
            NetError::Empty { .. } => Some("A net needs at least one place and one transition"),
            NetError::EmptyInitialMarking => {
                Some("Seed at least one place with a token in initialMarking")
            }
            NetError::UnknownMarkingPlace { .. } => {
                Some("Only declared places may appear in initialMarking")
            }
            NetError::Disconnected { .. } => {
                Some("Connect the node with an arc, or remove it from the net")
            }
        }
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").expect("id pattern compiles"));

/// True if `id` is a well-formed entity identifier
pub fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}

/// A place: a state where tokens reside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token capacity; `None` means unbounded. A capacity of 0 is a
    /// degenerate bound: no producing transition can ever be enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Place {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            capacity: None,
            metadata: Map::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A transition: an action that consumes and produces tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Plugin action this transition maps to when projected onto a DAG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Guard expression, opaque to the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Transition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            action: None,
            guard: None,
            metadata: Map::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Directed arc between a place and a transition (either direction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetArc {
    pub from_id: String,
    pub to_id: String,
    #[serde(default = "default_weight")]
    pub weight: u64,
}

fn default_weight() -> u64 {
    1
}

impl NetArc {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            weight: 1,
        }
    }

    pub fn weighted(from_id: impl Into<String>, to_id: impl Into<String>, weight: u64) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            weight,
        }
    }
}

// ============================================================================
// NET
// ============================================================================

/// A Petri net: places, transitions, arcs and one initial marking.
///
/// Collections keep insertion order; all iteration in the verifier,
/// projector and simulator follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Net {
    #[serde(default = "Net::schema_version")]
    pub schema_version: String,
    pub net_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub places: Vec<Place>,
    pub transitions: Vec<Transition>,
    pub arcs: Vec<NetArc>,
    pub initial_marking: Marking,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Net {
    /// Supported document schema version
    pub fn schema_version() -> String {
        "1.0".to_string()
    }

    /// Create an empty net with the given id
    pub fn new(net_id: impl Into<String>) -> Self {
        Self {
            schema_version: Self::schema_version(),
            net_id: net_id.into(),
            name: None,
            description: None,
            places: Vec::new(),
            transitions: Vec::new(),
            arcs: Vec::new(),
            initial_marking: Marking::empty(),
            metadata: Map::new(),
        }
    }

    pub fn add_place(&mut self, place: Place) -> &mut Self {
        self.places.push(place);
        self
    }

    pub fn add_transition(&mut self, transition: Transition) -> &mut Self {
        self.transitions.push(transition);
        self
    }

    pub fn add_arc(&mut self, arc: NetArc) -> &mut Self {
        self.arcs.push(arc);
        self
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Validate every structural invariant, collecting all faults.
    ///
    /// This is the implementation behind the verifier's STRUCTURAL check:
    /// bipartite arcs with known endpoints and positive weights, non-empty
    /// place/transition sets, a non-empty initial marking referencing only
    /// known places, and no disconnected node.
    pub fn validate_structure(&self) -> Vec<NetError> {
        let mut faults = Vec::new();

        if self.places.is_empty() {
            faults.push(NetError::Empty { kind: "places" });
        }
        if self.transitions.is_empty() {
            faults.push(NetError::Empty { kind: "transitions" });
        }

        let mut place_ids: HashSet<&str> = HashSet::new();
        for p in &self.places {
            if !is_valid_id(&p.id) {
                faults.push(NetError::InvalidId { id: p.id.clone() });
            }
            if !place_ids.insert(&p.id) {
                faults.push(NetError::DuplicateId {
                    kind: "place",
                    id: p.id.clone(),
                });
            }
        }

        let mut transition_ids: HashSet<&str> = HashSet::new();
        for t in &self.transitions {
            if !is_valid_id(&t.id) {
                faults.push(NetError::InvalidId { id: t.id.clone() });
            }
            if place_ids.contains(t.id.as_str()) {
                faults.push(NetError::DuplicateId {
                    kind: "transition",
                    id: t.id.clone(),
                });
            } else if !transition_ids.insert(&t.id) {
                faults.push(NetError::DuplicateId {
                    kind: "transition",
                    id: t.id.clone(),
                });
            }
        }

        let mut connected: HashSet<&str> = HashSet::new();
        for arc in &self.arcs {
            let from_place = place_ids.contains(arc.from_id.as_str());
            let from_transition = transition_ids.contains(arc.from_id.as_str());
            let to_place = place_ids.contains(arc.to_id.as_str());
            let to_transition = transition_ids.contains(arc.to_id.as_str());

            if !from_place && !from_transition {
                faults.push(NetError::UnknownEndpoint {
                    from: arc.from_id.clone(),
                    to: arc.to_id.clone(),
                    unknown: arc.from_id.clone(),
                });
                continue;
            }
            if !to_place && !to_transition {
                faults.push(NetError::UnknownEndpoint {
                    from: arc.from_id.clone(),
                    to: arc.to_id.clone(),
                    unknown: arc.to_id.clone(),
                });
                continue;
            }

            // Arcs must alternate place <-> transition
            let bipartite = (from_place && to_transition) || (from_transition && to_place);
            if !bipartite {
                faults.push(NetError::NotBipartite {
                    from: arc.from_id.clone(),
                    to: arc.to_id.clone(),
                });
                continue;
            }

            if arc.weight == 0 {
                faults.push(NetError::ZeroWeight {
                    from: arc.from_id.clone(),
                    to: arc.to_id.clone(),
                });
            }

            connected.insert(arc.from_id.as_str());
            connected.insert(arc.to_id.as_str());
        }

        if self.initial_marking.is_empty() {
            faults.push(NetError::EmptyInitialMarking);
        }
        for (place_id, _) in self.initial_marking.iter() {
            if !place_ids.contains(place_id) {
                faults.push(NetError::UnknownMarkingPlace {
                    place_id: place_id.to_string(),
                });
            }
        }

        for p in &self.places {
            if !connected.contains(p.id.as_str()) {
                faults.push(NetError::Disconnected {
                    kind: "place",
                    id: p.id.clone(),
                });
            }
        }
        for t in &self.transitions {
            if !connected.contains(t.id.as_str()) {
                faults.push(NetError::Disconnected {
                    kind: "transition",
                    id: t.id.clone(),
                });
            }
        }

        faults
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Parse a net from a JSON document, schema-checking it first
    pub fn from_json_str(raw: &str) -> crate::error::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// Parse a net from a YAML document, schema-checking it first
    pub fn from_yaml_str(raw: &str) -> crate::error::Result<Self> {
        let value: Value = serde_yaml::from_str(raw)?;
        Self::from_value(value)
    }

    /// Load a net from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }

    fn from_value(value: Value) -> crate::error::Result<Self> {
        if let Err(errors) = NET_SCHEMA.validate(&value) {
            let details = errors
                .map(|e| format!("{} (at {})", e, e.instance_path))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(NetError::Schema { details }.into());
        }
        let net: Net = serde_json::from_value(value)?;
        Ok(net)
    }

    /// Serialize to the canonical JSON document form
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// EMBEDDED DOCUMENT SCHEMA
// ============================================================================

static NET_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["netId", "places", "transitions", "arcs", "initialMarking"],
        "properties": {
            "schemaVersion": { "type": "string" },
            "netId": { "type": "string", "minLength": 1 },
            "name": { "type": ["string", "null"] },
            "description": { "type": ["string", "null"] },
            "places": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "name": { "type": ["string", "null"] },
                        "capacity": { "type": ["integer", "null"], "minimum": 0 },
                        "metadata": { "type": "object" }
                    }
                }
            },
            "transitions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "name": { "type": ["string", "null"] },
                        "action": { "type": ["string", "null"] },
                        "guard": { "type": ["string", "null"] },
                        "metadata": { "type": "object" }
                    }
                }
            },
            "arcs": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["fromId", "toId"],
                    "properties": {
                        "fromId": { "type": "string", "minLength": 1 },
                        "toId": { "type": "string", "minLength": 1 },
                        "weight": { "type": "integer", "minimum": 1 }
                    }
                }
            },
            "initialMarking": {
                "type": "object",
                "additionalProperties": { "type": "integer", "minimum": 0 }
            },
            "metadata": { "type": "object" }
        }
    })
});

static NET_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(&NET_SCHEMA_JSON).expect("embedded net schema is valid")
});
