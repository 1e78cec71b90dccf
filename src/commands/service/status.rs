//! Service status command.

use tracing::debug;

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::DaemonError;

/// Get the state of a managed service.
pub struct StatusServiceCommand {
    backend: Backend,
}

impl StatusServiceCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Command for StatusServiceCommand {
    fn name(&self) -> &'static str {
        "service.status"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        params.require_string("service")
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let service = params.get_string("service")?;

        debug!(request_id = %ctx.request_id, service = %service, "Getting service status");

        let state = self
            .backend
            .block_on(self.backend.orchestrator().get_service_status(&service))?;

        Ok(CommandResult::success(serde_json::json!({
            "service": service,
            "state": state,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TestBackend};
    use crate::error::ServiceErrorKind;

    #[test]
    fn test_status_of_known_service() {
        let harness = TestBackend::new();
        let cmd = StatusServiceCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({"service": "nfs"}));

        let result = cmd.execute(&context("service.status"), params).unwrap();
        let data = result.data.unwrap();
        assert_eq!(data["service"], "nfs");
        assert_eq!(data["state"], "running");
    }

    #[test]
    fn test_status_of_unknown_service() {
        let harness = TestBackend::new();
        let cmd = StatusServiceCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({"service": "afp"}));

        let result = cmd.execute(&context("service.status"), params);
        assert!(matches!(
            result,
            Err(DaemonError::Service {
                kind: ServiceErrorKind::UnknownService { .. }
            })
        ));
    }
}
