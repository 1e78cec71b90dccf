//! Run outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::services::ServiceState;

/// Steps of a configuration run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Render,
    Validate,
    Backup,
    Apply,
    Reload,
    Verify,
}

/// Terminal state of a configuration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    /// A step failed after the live file was touched and the previous
    /// configuration was restored.
    RolledBack,
    FailedNoRollback,
}

/// Everything a caller needs to report on one run.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub operation_id: Uuid,
    pub service: String,
    pub outcome: Outcome,
    /// Stages entered, in order.
    pub stages: Vec<Stage>,
    pub failed_stage: Option<Stage>,
    /// Machine code of the error that ended or derailed the run.
    pub error_code: Option<String>,
    pub diagnostic: Option<String>,
    pub rolled_back: bool,
    /// The live file is in an unknown state; rollback itself failed.
    pub inconsistent: bool,
    /// Hash of the rendered candidate.
    pub content_hash: Option<String>,
    /// Snapshot taken before the live file was replaced.
    pub snapshot_id: Option<u64>,
    /// The rendered file matched the live file; nothing was changed.
    pub unchanged: bool,
    pub service_state: Option<ServiceState>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl OperationResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}

/// Result of a manual rollback.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackReport {
    pub operation_id: Uuid,
    pub service: String,
    pub snapshot_id: u64,
    /// The snapshot recorded no live file, so the live file was removed.
    pub restored_absent: bool,
    pub service_state: ServiceState,
    pub duration_ms: u64,
}
