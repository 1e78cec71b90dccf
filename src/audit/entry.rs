//! Audit entry types.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::orchestrator::{OperationResult, Outcome, RollbackReport};

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp, millisecond precision.
    pub timestamp: String,
    pub operation_id: Uuid,
    /// What was done: `apply`, `rollback` or `control.<action>`.
    pub action: String,
    pub service: String,
    /// Action-specific details (stages, hashes, snapshot ids).
    pub detail: serde_json::Value,
    pub result: AuditResult,
    pub duration_ms: u64,
}

/// Result of an audited action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum AuditResult {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failure")]
    Failure {
        error_code: String,
        error_message: String,
    },
}

impl AuditEntry {
    pub fn success(
        operation_id: Uuid,
        action: impl Into<String>,
        service: impl Into<String>,
        detail: serde_json::Value,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: now(),
            operation_id,
            action: action.into(),
            service: service.into(),
            detail,
            result: AuditResult::Success,
            duration_ms,
        }
    }

    pub fn failure(
        operation_id: Uuid,
        action: impl Into<String>,
        service: impl Into<String>,
        detail: serde_json::Value,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: now(),
            operation_id,
            action: action.into(),
            service: service.into(),
            detail,
            result: AuditResult::Failure {
                error_code: error_code.into(),
                error_message: error_message.into(),
            },
            duration_ms,
        }
    }

    /// Entry for a finished configuration run. Rolled-back runs count as failures.
    pub fn from_operation(result: &OperationResult) -> Self {
        let detail = serde_json::json!({
            "outcome": result.outcome,
            "stages": result.stages,
            "failed_stage": result.failed_stage,
            "rolled_back": result.rolled_back,
            "inconsistent": result.inconsistent,
            "unchanged": result.unchanged,
            "content_hash": result.content_hash,
            "snapshot_id": result.snapshot_id,
        });

        match (&result.outcome, &result.error_code) {
            (Outcome::Succeeded, _) | (_, None) => Self::success(
                result.operation_id,
                "apply",
                result.service.as_str(),
                detail,
                result.duration_ms,
            ),
            (_, Some(code)) => Self::failure(
                result.operation_id,
                "apply",
                result.service.as_str(),
                detail,
                code.as_str(),
                result.diagnostic.clone().unwrap_or_default(),
                result.duration_ms,
            ),
        }
    }

    /// Entry for a completed manual rollback.
    pub fn from_rollback(report: &RollbackReport) -> Self {
        Self::success(
            report.operation_id,
            "rollback",
            report.service.as_str(),
            serde_json::json!({
                "snapshot_id": report.snapshot_id,
                "restored_absent": report.restored_absent,
                "service_state": report.service_state,
            }),
            report.duration_ms,
        )
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_success_serialization() {
        let entry = AuditEntry::success(
            Uuid::nil(),
            "control.restart",
            "smb",
            serde_json::json!({"state": "running"}),
            15,
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"action\":\"control.restart\""));
        assert!(json.contains("\"service\":\"smb\""));
        assert!(json.contains("\"duration_ms\":15"));
        assert!(entry.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_audit_entry_failure_serialization() {
        let entry = AuditEntry::failure(
            Uuid::nil(),
            "apply",
            "nfs",
            serde_json::Value::Null,
            "SYNTAX_ERROR",
            "line 1: export path 'srv' is not absolute",
            5,
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"failure\""));
        assert!(json.contains("\"error_code\":\"SYNTAX_ERROR\""));
    }
}
