//! # Veriflow Error Module
//!
//! Unified error handling with fix suggestions.
//!
//! ## Design
//!
//! Each layer keeps its own `thiserror` enum close to the code that raises
//! it:
//!
//! - `net::NetError`: Petri-net structural faults (VF-1xx)
//! - `dag::DagValidationError`: DAG structural faults (VF-2xx)
//! - `projector::ProjectionError`: projection construction faults (VF-3xx)
//! - `engine`/`plugin` errors: runtime faults (VF-4xx)
//!
//! Verifier bound/timeout outcomes are *not* errors; they propagate as
//! `CheckStatus::Inconclusive*` inside the report.
//!
//! This module provides:
//! - A `FixSuggestion` trait for unified fix-suggestion access
//! - A `VeriflowError` enum for top-level errors (wrapping specific errors)

use thiserror::Error;

// ============================================================================
// FIX SUGGESTION TRAIT
// ============================================================================

/// Trait for errors that can provide fix suggestions
///
/// All veriflow diagnostics should implement this trait so the CLI can
/// print actionable guidance next to the error itself.
pub trait FixSuggestion {
    /// Get a fix suggestion for this error, if available
    fn fix_suggestion(&self) -> Option<&str>;
}

// ============================================================================
// VERIFLOW ERROR (top-level)
// ============================================================================

/// Top-level error type
///
/// Wraps the specific error types from each module, providing a unified
/// interface for the CLI entry point and for embedders that do not care
/// which layer failed.
#[derive(Error, Debug)]
pub enum VeriflowError {
    /// Petri-net structural error
    #[error("{0}")]
    Net(#[from] crate::net::NetError),

    /// Verifier configuration error
    #[error("{0}")]
    VerifierConfig(#[from] crate::verifier::ConfigError),

    /// DAG validation error
    #[error("{0}")]
    Dag(#[from] crate::dag::DagValidationError),

    /// Projection construction error
    #[error("{0}")]
    Projection(#[from] crate::projector::ProjectionError),

    /// Plugin registry / dispatch error
    #[error("{0}")]
    Plugin(#[from] crate::plugin::PluginError),

    /// Execution engine error
    #[error("{0}")]
    Engine(#[from] crate::engine::EngineError),

    /// Intent spec error
    #[error("{0}")]
    Intent(#[from] crate::intent::IntentError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// IO error (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl VeriflowError {
    /// Create a generic error with a message
    pub fn other(msg: impl Into<String>) -> Self {
        VeriflowError::Other(msg.into())
    }
}

impl FixSuggestion for VeriflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            VeriflowError::Net(e) => e.fix_suggestion(),
            VeriflowError::VerifierConfig(e) => e.fix_suggestion(),
            VeriflowError::Dag(e) => e.fix_suggestion(),
            VeriflowError::Projection(e) => e.fix_suggestion(),
            VeriflowError::Plugin(e) => e.fix_suggestion(),
            VeriflowError::Engine(e) => e.fix_suggestion(),
            VeriflowError::Intent(e) => e.fix_suggestion(),
            VeriflowError::JsonParse(_) => {
                Some("Check the document against the net JSON schema")
            }
            VeriflowError::YamlParse(_) => Some("Check YAML indentation and quoting"),
            VeriflowError::Io(_) => Some("Check that the file exists and is readable"),
            VeriflowError::Other(_) => None,
        }
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, VeriflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_error_has_no_suggestion() {
        let err = VeriflowError::other("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(err.fix_suggestion().is_none());
    }

    #[test]
    fn io_error_suggests_checking_path() {
        let err: VeriflowError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(err.fix_suggestion().unwrap().contains("file exists"));
    }
}
