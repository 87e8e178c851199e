//! # Veriflow
//!
//! Workflow modeling and execution with formal verification.
//!
//! ## Overview
//!
//! A workflow lives as two coupled views:
//!
//! - a **Petri net** — the source of truth, formally verified for
//!   deadlock freedom, terminal reachability, liveness and boundedness
//! - an executable **DAG** — derived from the net by a deterministic
//!   projection and run by the execution engine
//!
//! ## Pipeline
//!
//! ```text
//! IntentSpec ──build_net──> Net ──Verifier::verify──> VerificationReport
//!                            │
//!                            └──project──> Dag ──Executor::execute──> RunSummary
//!                                                        │
//!                                                        └──> TraceLog / MetricsSnapshot
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use veriflow::{
//!     Executor, EngineConfig, ExecutionContext, MetricsCollector, Net,
//!     PluginRegistry, TraceLog, Verifier,
//! };
//!
//! let net = Net::from_json_str(&std::fs::read_to_string("flow.net.json")?)?;
//!
//! let report = Verifier::default().verify(&net);
//! if !report.passed() {
//!     eprintln!("{}", report.render());
//!     return Err(anyhow::anyhow!("verification failed"));
//! }
//!
//! let dag = veriflow::project(&net)?;
//!
//! let registry = Arc::new(PluginRegistry::new());
//! // registry.register(...)?;
//! let metrics = Arc::new(MetricsCollector::new());
//! let executor = Executor::new(EngineConfig::default(), registry, metrics)?;
//!
//! let ctx = ExecutionContext::new();
//! let trace = TraceLog::new();
//! let summary = tokio_runtime.block_on(executor.execute(&dag, &ctx, &trace))?;
//! println!("{} nodes succeeded", summary.nodes_succeeded);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`net`] — Petri-net model, pure semantics, deterministic simulation
//! - [`verifier`] — bounded state-space checks with witness paths
//! - [`projector`] — single-producer/single-consumer projection
//! - [`dag`] — DAG model, dependency graph, validation
//! - [`engine`] — execution engine (retries, hooks, fallbacks, deadlines)
//! - [`plugin`] — plugin contract, registry and built-ins
//! - [`intent`] — IntentSpec boundary and net builder
//! - [`trace`] / [`metrics`] / [`store`] — observability and state
//!
//! ## Error codes
//!
//! | Range | Layer |
//! |-------|-------|
//! | VF-1xx | net structure, verifier config, intent specs |
//! | VF-2xx | DAG validation |
//! | VF-3xx | projection |
//! | VF-4xx | engine and plugin registry |

pub mod dag;
pub mod engine;
pub mod error;
pub mod intent;
pub mod metrics;
pub mod net;
pub mod plugin;
pub mod projector;
pub mod store;
pub mod trace;
pub mod verifier;

// Re-export the main types at the crate root
pub use dag::{Dag, DepGraph, RetryPolicy, TaskNode};
pub use engine::{
    EngineConfig, EngineError, ErrorKind, ExecutionContext, ExecutionResult, Executor,
    NodeExecutionResult, NodeStatus, RunSummary,
};
pub use error::{FixSuggestion, VeriflowError};
pub use intent::{IntentSpec, IntentStep, StepType};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use net::{Marking, Net, NetArc, NetIndex, Place, Transition};
pub use plugin::{Plugin, PluginRegistry, PluginResult, PluginStatus};
pub use projector::{project, ProjectionError};
pub use store::{InMemoryStore, MemoryStore, StoredEntry};
pub use trace::{TraceContext, TraceEvent, TraceLog};
pub use verifier::{
    CheckKind, CheckStatus, OverallStatus, VerificationReport, Verifier, VerifierConfig,
};
