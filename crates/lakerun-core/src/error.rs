//! Error model for pipeline execution.
//!
//! Every failure surfaces as a [`PipelineError`] variant matching where it
//! arose. Configuration errors abort before any data motion; the orchestrator
//! wraps everything uncaught during a run into [`PipelineError::Execution`],
//! which carries the finalized metrics snapshot so callers can report what
//! succeeded before the failure.

use crate::pipeline::PipelineMetrics;

/// Categorized pipeline error.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad or missing configuration, bad variable reference.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown transform type, strict-mode missing column, unknown cast type.
    #[error("transformation error: {0}")]
    Transformation(String),

    /// Quality check failure escalated by `fail_on_error`.
    #[error("quality check failed: {name}: {message}")]
    Validation { name: String, message: String },

    /// Read failure, wrapped with the source kind.
    #[error("failed to read from {kind} source: {message}")]
    Reader { kind: String, message: String },

    /// Write failure, wrapped with the fully-qualified target name.
    #[error("failed to write to {table}: {message}")]
    Writer { table: String, message: String },

    /// Expression parse or evaluation failure.
    #[error("expression error: {0}")]
    Expression(String),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    /// Top-level run failure carrying the partial metrics snapshot.
    #[error("pipeline execution failed: {message}")]
    Execution {
        message: String,
        metrics: Box<PipelineMetrics>,
    },
}

impl PipelineError {
    /// Returns the metrics snapshot if this is an `Execution` error.
    pub fn metrics(&self) -> Option<&PipelineMetrics> {
        match self {
            Self::Execution { metrics, .. } => Some(metrics),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_exposes_metrics() {
        let mut metrics = PipelineMetrics::new("orders");
        metrics.records_read = 42;
        let err = PipelineError::Execution {
            message: "boom".to_string(),
            metrics: Box::new(metrics),
        };
        assert_eq!(err.metrics().unwrap().records_read, 42);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn non_execution_errors_have_no_metrics() {
        let err = PipelineError::Configuration("missing name".to_string());
        assert!(err.metrics().is_none());
    }

    #[test]
    fn writer_error_names_the_table() {
        let err = PipelineError::Writer {
            table: "main.silver.orders".to_string(),
            message: "disk full".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("main.silver.orders"));
        assert!(msg.contains("disk full"));
    }
}
