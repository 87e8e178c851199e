//! # Metrics Collector
//!
//! Counters and timing aggregates for executions, nodes and plugin calls.
//!
//! The collector is an explicitly constructed service injected into engine
//! instances (never an ambient singleton). Counters update atomically
//! under contention; a snapshot is a best-effort consistent view taken
//! without stopping writers.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// TIMING AGGREGATE
// ============================================================================

/// Aggregate over recorded durations for one timer name
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingStats {
    pub count: u64,
    pub total_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl TimingStats {
    fn record(&mut self, ms: u64) {
        self.count += 1;
        self.total_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
    }

    fn seed(ms: u64) -> Self {
        Self {
            count: 1,
            total_ms: ms,
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Point-in-time view of the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub executions_started: u64,
    pub executions_completed: u64,
    pub nodes_started: u64,
    pub nodes_succeeded: u64,
    pub nodes_failed: u64,
    pub nodes_skipped: u64,
    pub plugin_calls: u64,
    pub plugin_failures: u64,
    pub retries: u64,
    pub fallbacks_used: u64,
    pub counters: std::collections::BTreeMap<String, u64>,
    pub timings: std::collections::BTreeMap<String, TimingStats>,
    pub gauges: std::collections::BTreeMap<String, f64>,
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Thread-safe metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    executions_started: AtomicU64,
    executions_completed: AtomicU64,
    nodes_started: AtomicU64,
    nodes_succeeded: AtomicU64,
    nodes_failed: AtomicU64,
    nodes_skipped: AtomicU64,
    plugin_calls: AtomicU64,
    plugin_failures: AtomicU64,
    retries: AtomicU64,
    fallbacks_used: AtomicU64,
    counters: DashMap<String, u64>,
    timings: DashMap<String, TimingStats>,
    gauges: DashMap<String, f64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution_start(&self) {
        self.executions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execution_complete(&self, duration_ms: u64) {
        self.executions_completed.fetch_add(1, Ordering::Relaxed);
        self.record_timing("execution", duration_ms);
    }

    pub fn record_node_start(&self) {
        self.nodes_started.fetch_add(1, Ordering::Relaxed);
    }

    /// `status` is the terminal node status name ("success", "failure",
    /// "skipped"); unknown names only bump the shared timing.
    pub fn record_node_complete(&self, status: &str, duration_ms: u64) {
        match status {
            "success" => self.nodes_succeeded.fetch_add(1, Ordering::Relaxed),
            "failure" => self.nodes_failed.fetch_add(1, Ordering::Relaxed),
            "skipped" => self.nodes_skipped.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
        self.record_timing("node", duration_ms);
    }

    pub fn record_plugin_execution(&self, plugin_id: &str, success: bool, duration_ms: u64) {
        self.plugin_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.plugin_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.record_timing(&format!("plugin.{}", plugin_id), duration_ms);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_counter(&self, name: &str) {
        self.increment_counter_by(name, 1);
    }

    pub fn increment_counter_by(&self, name: &str, delta: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn record_timing(&self, name: &str, duration_ms: u64) {
        self.timings
            .entry(name.to_string())
            .and_modify(|stats| stats.record(duration_ms))
            .or_insert_with(|| TimingStats::seed(duration_ms));
    }

    pub fn record_custom_metric(&self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    /// Best-effort consistent snapshot
    pub fn get_metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions_started: self.executions_started.load(Ordering::Relaxed),
            executions_completed: self.executions_completed.load(Ordering::Relaxed),
            nodes_started: self.nodes_started.load(Ordering::Relaxed),
            nodes_succeeded: self.nodes_succeeded.load(Ordering::Relaxed),
            nodes_failed: self.nodes_failed.load(Ordering::Relaxed),
            nodes_skipped: self.nodes_skipped.load(Ordering::Relaxed),
            plugin_calls: self.plugin_calls.load(Ordering::Relaxed),
            plugin_failures: self.plugin_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fallbacks_used: self.fallbacks_used.load(Ordering::Relaxed),
            counters: self
                .counters
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            timings: self
                .timings
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            gauges: self
                .gauges
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }

    /// Zero every counter, timer and gauge
    pub fn reset(&self) {
        self.executions_started.store(0, Ordering::Relaxed);
        self.executions_completed.store(0, Ordering::Relaxed);
        self.nodes_started.store(0, Ordering::Relaxed);
        self.nodes_succeeded.store(0, Ordering::Relaxed);
        self.nodes_failed.store(0, Ordering::Relaxed);
        self.nodes_skipped.store(0, Ordering::Relaxed);
        self.plugin_calls.store(0, Ordering::Relaxed);
        self.plugin_failures.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.fallbacks_used.store(0, Ordering::Relaxed);
        self.counters.clear();
        self.timings.clear();
        self.gauges.clear();
    }

    /// Write the snapshot as JSON to the given writer
    pub fn flush<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let snapshot = self.get_metrics_snapshot();
        let value: Value = json!(snapshot);
        writer.write_all(value.to_string().as_bytes())?;
        writer.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_counters_split_by_status() {
        let metrics = MetricsCollector::new();
        metrics.record_node_start();
        metrics.record_node_complete("success", 5);
        metrics.record_node_start();
        metrics.record_node_complete("failure", 7);
        metrics.record_node_start();
        metrics.record_node_complete("skipped", 0);

        let snap = metrics.get_metrics_snapshot();
        assert_eq!(snap.nodes_started, 3);
        assert_eq!(snap.nodes_succeeded, 1);
        assert_eq!(snap.nodes_failed, 1);
        assert_eq!(snap.nodes_skipped, 1);
        assert_eq!(snap.timings["node"].count, 3);
    }

    #[test]
    fn timing_aggregates_track_min_max() {
        let metrics = MetricsCollector::new();
        metrics.record_timing("step", 10);
        metrics.record_timing("step", 2);
        metrics.record_timing("step", 30);

        let stats = metrics.get_metrics_snapshot().timings["step"];
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_ms, 2);
        assert_eq!(stats.max_ms, 30);
        assert_eq!(stats.total_ms, 42);
        assert!((stats.mean_ms() - 14.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_clears_everything() {
        let metrics = MetricsCollector::new();
        metrics.record_execution_start();
        metrics.increment_counter("x");
        metrics.record_custom_metric("queue_depth", 4.0);
        metrics.reset();

        let snap = metrics.get_metrics_snapshot();
        assert_eq!(snap.executions_started, 0);
        assert!(snap.counters.is_empty());
        assert!(snap.gauges.is_empty());
    }

    #[test]
    fn flush_emits_one_json_line() {
        let metrics = MetricsCollector::new();
        metrics.increment_counter_by("hits", 3);
        let mut buf = Vec::new();
        metrics.flush(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        let value: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["counters"]["hits"], json!(3));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        use std::sync::Arc;
        let metrics = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_node_start();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.get_metrics_snapshot().nodes_started, 8000);
    }
}
