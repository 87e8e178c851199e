//! # Trace Context and Trace Log
//!
//! Ordered execution records with correlation identifiers.
//!
//! - [`TraceContext`]: trace/correlation/span ids with baggage; child
//!   contexts inherit trace and correlation ids and get a fresh span id
//! - [`TraceEvent`]: one record of a transition firing or a node execution
//!   step, carrying before/after state
//! - [`TraceLog`]: thread-safe, append-only, with a process-wide-monotonic
//!   sequence number per event and ND-JSON export (one event per line)
//!
//! Sequence numbers use a shared atomic so they are totally ordered even if
//! events are appended from multiple tasks. Timestamps are wall clock
//! (epoch milliseconds); ordering guarantees come from the sequence number,
//! never from the clock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::net::Marking;

// ============================================================================
// ID GENERATION
// ============================================================================

fn hex_bytes(count: usize) -> String {
    let bytes = Uuid::new_v4().into_bytes();
    bytes[..count].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Current wall-clock time as epoch milliseconds
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// TRACE CONTEXT
// ============================================================================

/// Correlation identifiers threaded through one unit of work.
///
/// `trace_id` is 128 bits, `correlation_id` and `span_id` 64 bits, all
/// hex-encoded with a stable prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub trace_id: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub baggage: BTreeMap<String, String>,
    pub start_time: u64,
}

impl TraceContext {
    /// Create a root context with fresh identifiers
    pub fn new() -> Self {
        Self {
            trace_id: format!("trace_{}", hex_bytes(16)),
            correlation_id: format!("corr_{}", hex_bytes(8)),
            parent_span_id: None,
            span_id: format!("span_{}", hex_bytes(8)),
            baggage: BTreeMap::new(),
            start_time: epoch_ms(),
        }
    }

    /// Derive a child context: same trace/correlation ids and baggage,
    /// fresh span id, parent span recorded
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            correlation_id: self.correlation_id.clone(),
            parent_span_id: Some(self.span_id.clone()),
            span_id: format!("span_{}", hex_bytes(8)),
            baggage: self.baggage.clone(),
            start_time: epoch_ms(),
        }
    }

    /// Attach a baggage entry (returns self for chaining)
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TRACE EVENT
// ============================================================================

/// Free-form annotations on a trace event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEventMeta {
    /// `deterministic` / `interactive` for net simulation, `execution`
    /// for engine node events
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Other firings/nodes that were possible at this step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    /// Warnings attached to this step (hook failures and the like)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One ordered record of a transition firing or node execution step.
///
/// Exactly one of `transition` / `node_id` is set depending on the source.
/// Serialized as a single ND-JSON line for streaming consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub timestamp: u64,
    pub sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_places: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_places: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_seed: Option<u64>,
    /// Ids enabled (net) or ready (engine) when the step was taken
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marking_before: Option<Marking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marking_after: Option<Marking>,
    /// Context variable snapshot before a node ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<Value>,
    /// Context variable snapshot after a node ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<Value>,
    pub metadata: TraceEventMeta,
}

/// Builder-style payload for appending to a [`TraceLog`]; the log fills in
/// timestamp and sequence number at append time.
#[derive(Debug, Clone, Default)]
pub struct TraceEventDraft {
    pub transition: Option<String>,
    pub node_id: Option<String>,
    pub from_places: Vec<String>,
    pub to_places: Vec<String>,
    pub token_id: Option<String>,
    pub simulation_seed: Option<u64>,
    pub enabled: Vec<String>,
    pub marking_before: Option<Marking>,
    pub marking_after: Option<Marking>,
    pub context_before: Option<Value>,
    pub context_after: Option<Value>,
    pub metadata: TraceEventMeta,
}

impl TraceEventDraft {
    /// Draft for a net transition firing
    pub fn firing(transition: impl Into<String>) -> Self {
        Self {
            transition: Some(transition.into()),
            metadata: TraceEventMeta {
                mode: "deterministic".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Draft for a DAG node execution step
    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            metadata: TraceEventMeta {
                mode: "execution".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

// ============================================================================
// TRACE LOG
// ============================================================================

/// Thread-safe, append-only event log.
///
/// Sequence numbers are assigned from one atomic counter, so they are
/// strictly increasing in append order across all writers.
#[derive(Debug, Default)]
pub struct TraceLog {
    next_sequence: AtomicU64,
    events: RwLock<Vec<TraceEvent>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a draft, assigning sequence number and timestamp. Returns
    /// the assigned sequence number.
    pub fn append(&self, draft: TraceEventDraft) -> u64 {
        let sequence_number = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let event = TraceEvent {
            timestamp: epoch_ms(),
            sequence_number,
            transition: draft.transition,
            node_id: draft.node_id,
            from_places: draft.from_places,
            to_places: draft.to_places,
            token_id: draft.token_id,
            simulation_seed: draft.simulation_seed,
            enabled: draft.enabled,
            marking_before: draft.marking_before,
            marking_after: draft.marking_after,
            context_before: draft.context_before,
            context_after: draft.context_after,
            metadata: draft.metadata,
        };
        self.events.write().push(event);
        sequence_number
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Snapshot of all events in sequence order
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.read().clone()
    }

    /// Export as ND-JSON, one event per line
    pub fn to_ndjson(&self) -> String {
        let events = self.events.read();
        let mut out = String::new();
        for event in events.iter() {
            // Event serialization cannot fail: all fields are plain data
            if let Ok(line) = serde_json::to_string(event) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_context_ids_have_expected_shape() {
        let ctx = TraceContext::new();
        assert!(ctx.trace_id.starts_with("trace_"));
        assert_eq!(ctx.trace_id.len(), "trace_".len() + 32);
        assert!(ctx.correlation_id.starts_with("corr_"));
        assert_eq!(ctx.correlation_id.len(), "corr_".len() + 16);
        assert!(ctx.span_id.starts_with("span_"));
        assert_eq!(ctx.span_id.len(), "span_".len() + 16);
    }

    #[test]
    fn child_context_inherits_trace_and_baggage() {
        let root = TraceContext::new().with_baggage("tenant", "acme");
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.correlation_id, root.correlation_id);
        assert_eq!(child.parent_span_id.as_deref(), Some(root.span_id.as_str()));
        assert_ne!(child.span_id, root.span_id);
        assert_eq!(child.baggage.get("tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let log = TraceLog::new();
        let a = log.append(TraceEventDraft::node("n1"));
        let b = log.append(TraceEventDraft::node("n2"));
        let c = log.append(TraceEventDraft::firing("t1"));
        assert!(a < b && b < c);
        let events = log.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].node_id.as_deref(), Some("n1"));
        assert_eq!(events[2].transition.as_deref(), Some("t1"));
    }

    #[test]
    fn ndjson_is_one_event_per_line() {
        let log = TraceLog::new();
        log.append(TraceEventDraft::node("a"));
        log.append(TraceEventDraft::node("b"));
        let nd = log.to_ndjson();
        let lines: Vec<&str> = nd.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TraceEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.node_id.as_deref(), Some("a"));
        assert_eq!(parsed.metadata.mode, "execution");
    }

    #[test]
    fn event_round_trips_through_json() {
        let log = TraceLog::new();
        let mut draft = TraceEventDraft::firing("t_run");
        draft.from_places = vec!["p_code".into()];
        draft.to_places = vec!["p_testing".into()];
        draft.marking_before = Some([("p_code", 1u64)].into_iter().collect());
        draft.marking_after = Some([("p_testing", 1u64)].into_iter().collect());
        draft.enabled = vec!["t_run".into()];
        log.append(draft);

        let events = log.events();
        let json = serde_json::to_string(&events[0]).unwrap();
        let back: TraceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, events[0]);
    }
}
