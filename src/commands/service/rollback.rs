//! Manual rollback command.

use tracing::info;

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::DaemonError;

/// Restore the most recent snapshot of a service and reload it.
pub struct RollbackServiceCommand {
    backend: Backend,
}

impl RollbackServiceCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Command for RollbackServiceCommand {
    fn name(&self) -> &'static str {
        "service.rollback"
    }

    fn mutating(&self) -> bool {
        true
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

        info!(request_id = %ctx.request_id, service = %service, "Rolling back service");

        let report = self
            .backend
            .block_on(self.backend.orchestrator().rollback_service(&service))?;

        Ok(CommandResult::success(serde_json::to_value(report)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TestBackend};
    use crate::error::ServiceErrorKind;

    #[test]
    fn test_rollback_without_history() {
        let harness = TestBackend::new();
        let cmd = RollbackServiceCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({"service": "ftp"}));

        let result = cmd.execute(&context("service.rollback"), params);
        assert!(matches!(
            result,
            Err(DaemonError::Service {
                kind: ServiceErrorKind::NoSnapshotAvailable { .. }
            })
        ));
    }
}
