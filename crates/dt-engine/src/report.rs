//! Run records.

use chrono::{DateTime, Utc};
use dt_core::{Document, EngineError, OptimizationError, OptimizationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one run: `Pending → Running → Completed | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: RunStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running) => true,
            (Self::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// Everything a run produced.
///
/// `results` holds one entry per optimizer that ran, in execution order. In
/// strict mode the optimizer that failed has no entry: its name heads
/// `not_attempted` and its error is in `error`. In best-effort mode it gets a
/// zero-gain placeholder instead (see [`OptimizationResult::failed`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Output of the last optimizer that succeeded.
    pub document: Document,
    pub results: Vec<OptimizationResult>,
    pub score: f64,
    pub not_attempted: Vec<String>,
    pub error: Option<OptimizationError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn result(&self, optimizer: &str) -> Option<&OptimizationResult> {
        self.results.iter().find(|r| r.optimizer_name() == optimizer)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Flat record without the document, for logs and storage.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration_ms(),
            score: self.score,
            document_bytes: self.document.serialized_size(),
            results: self.results.clone(),
            not_attempted: self.not_attempted.clone(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }

    /// `Err` for a failed run, the report otherwise.
    pub fn into_result(mut self) -> Result<RunReport, EngineError> {
        if self.status == RunStatus::Failed {
            if let Some(err) = self.error.take() {
                return Err(err.into());
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub score: f64,
    pub document_bytes: usize,
    pub results: Vec<OptimizationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_attempted: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
