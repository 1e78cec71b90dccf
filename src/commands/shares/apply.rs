//! Apply a share list to one or more services.

use tracing::info;

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::{DaemonError, ValidationErrorKind};
use crate::orchestrator::{ApplyRequest, OperationResult};
use crate::shares::{GlobalOptions, ShareSpec};

/// `shares.apply`: run the full render/validate/backup/apply/reload/verify
/// cycle.
///
/// Single service: `{service, specs, options?}`. The response data is the
/// run report; a failed run becomes an error response whose code is the
/// run's error code and whose details carry the report.
///
/// Batch: `{requests: [{service, specs, options?}, ...]}`. Services run
/// concurrently; the response lists one report per request, in order.
pub struct ApplySharesCommand {
    backend: Backend,
}

impl ApplySharesCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    fn apply_one(&self, params: &CommandParams) -> Result<CommandResult, DaemonError> {
        let service = params.get_string("service")?;
        let specs: Vec<ShareSpec> = params.get_typed("specs")?;
        let options: GlobalOptions = params.get_typed_or_default("options")?;

        let result = self.backend.block_on(
            self.backend
                .orchestrator()
                .apply_configuration(&service, specs, options),
        );
        report(result)
    }

    fn apply_batch(&self, params: &CommandParams) -> Result<CommandResult, DaemonError> {
        let requests: Vec<ApplyRequest> = params.get_typed("requests")?;
        let results = self
            .backend
            .block_on(self.backend.orchestrator().apply_many(requests));

        let all_succeeded = results.iter().all(OperationResult::succeeded);
        Ok(CommandResult::success(serde_json::json!({
            "all_succeeded": all_succeeded,
            "results": results,
        })))
    }
}

fn report(result: OperationResult) -> Result<CommandResult, DaemonError> {
    let data = serde_json::to_value(&result)?;
    if result.succeeded() {
        return Ok(CommandResult::success(data));
    }

    let code = result
        .error_code
        .clone()
        .unwrap_or_else(|| "COMMAND_ERROR".to_string());
    let message = result
        .diagnostic
        .clone()
        .unwrap_or_else(|| format!("configuration run for '{}' failed", result.service));
    Ok(CommandResult::failure_with_details(code, message, data))
}

impl Command for ApplySharesCommand {
    fn name(&self) -> &'static str {
        "shares.apply"
    }

    fn mutating(&self) -> bool {
        true
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        if params.has("requests") {
            return Ok(());
        }
        params.require_string("service")?;
        if !params.has("specs") {
            return Err(DaemonError::Validation {
                kind: ValidationErrorKind::MissingParameter {
                    param: "specs".to_string(),
                },
            });
        }
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let batch = params.has("requests");
        info!(request_id = %ctx.request_id, batch, "Applying share configuration");

        if batch {
            self.apply_batch(&params)
        } else {
            self.apply_one(&params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TestBackend};

    #[test]
    fn test_validate_requires_specs() {
        let harness = TestBackend::new();
        let cmd = ApplySharesCommand::new(harness.backend());
        assert!(cmd
            .validate(&CommandParams::new(serde_json::json!({"service": "smb"})))
            .is_err());
        assert!(cmd
            .validate(&CommandParams::new(
                serde_json::json!({"service": "smb", "specs": []})
            ))
            .is_ok());
        assert!(cmd
            .validate(&CommandParams::new(serde_json::json!({"requests": []})))
            .is_ok());
    }

    #[test]
    fn test_apply_writes_live_file() {
        let harness = TestBackend::new();
        let cmd = ApplySharesCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({
            "service": "nfs",
            "specs": [{
                "name": "media",
                "path": "/srv/media",
                "allowed_networks": ["10.0.0.0/8"]
            }]
        }));

        let result = cmd.execute(&context("shares.apply"), params).unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["outcome"], "succeeded");

        let live = std::fs::read_to_string(harness.live_path("nfs")).unwrap();
        assert!(live.contains("/srv/media"));
        assert!(live.contains("10.0.0.0/8(rw,sync,no_subtree_check)"));
    }

    #[test]
    fn test_failed_run_reports_code_and_details() {
        let harness = TestBackend::new();
        let cmd = ApplySharesCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({
            "service": "smb",
            "specs": [{"name": "bad name!", "path": "/srv/x"}]
        }));

        let result = cmd.execute(&context("shares.apply"), params).unwrap();
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("INVALID_SPEC"));
        assert!(result.error_message.unwrap().contains("bad name!"));
        let details = result.error_details.unwrap();
        assert_eq!(details["outcome"], "failed_no_rollback");
        assert_eq!(details["failed_stage"], "render");
        assert!(!harness.live_path("smb").exists());
    }

    #[test]
    fn test_batch_reports_in_order() {
        let harness = TestBackend::new();
        let cmd = ApplySharesCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({
            "requests": [
                {"service": "smb", "specs": [{"name": "docs", "path": "/srv/docs"}]},
                {"service": "afp", "specs": []}
            ]
        }));

        let result = cmd.execute(&context("shares.apply"), params).unwrap();
        let data = result.data.unwrap();
        assert_eq!(data["all_succeeded"], false);
        assert_eq!(data["results"][0]["service"], "smb");
        assert_eq!(data["results"][0]["outcome"], "succeeded");
        assert_eq!(data["results"][1]["error_code"], "UNKNOWN_SERVICE");
    }
}
