//! Run metrics: one mutable record per execution attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal or in-flight run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Metrics collected during one pipeline execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub pipeline_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub records_read: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub transformations_applied: u32,
    pub quality_checks_passed: u32,
    pub quality_checks_failed: u32,
    pub error_message: Option<String>,
    pub duration_seconds: f64,
}

impl PipelineMetrics {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            records_read: 0,
            records_written: 0,
            records_failed: 0,
            transformations_applied: 0,
            quality_checks_passed: 0,
            quality_checks_failed: 0,
            error_message: None,
            duration_seconds: 0.0,
        }
    }

    /// Finalize the run. End time, status, and duration are fixed at the
    /// first call; later calls are no-ops.
    pub fn complete(&mut self, status: RunStatus, error: Option<String>) {
        if self.end_time.is_some() {
            return;
        }
        let end = Utc::now();
        self.duration_seconds = (end - self.start_time).num_microseconds().unwrap_or(0) as f64
            / 1_000_000.0;
        self.end_time = Some(end);
        self.status = status;
        self.error_message = error;
    }

    pub fn is_terminal(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
