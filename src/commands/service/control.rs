//! Manual service control.

use tracing::info;

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::{DaemonError, ValidationErrorKind};
use crate::services::ServiceAction;

/// Run `start`, `stop`, `restart`, `reload` or `status` on a managed service.
///
/// Mutating actions take the service lock, so they never interleave with a
/// configuration run on the same service.
pub struct ControlServiceCommand {
    backend: Backend,
}

impl ControlServiceCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

fn parse_action(params: &CommandParams) -> Result<ServiceAction, DaemonError> {
    let name = params.get_string("action")?;
    ServiceAction::parse(&name).ok_or_else(|| DaemonError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: "action".to_string(),
            message: format!(
                "'{}' is not one of start, stop, restart, reload, status",
                name
            ),
        },
    })
}

impl Command for ControlServiceCommand {
    fn name(&self) -> &'static str {
        "service.control"
    }

    fn mutating(&self) -> bool {
        true
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        params.require_string("service")?;
        parse_action(params).map(|_| ())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let service = params.get_string("service")?;
        let action = parse_action(&params)?;

        info!(
            request_id = %ctx.request_id,
            service = %service,
            action = %action,
            "Controlling service"
        );

        let state = self
            .backend
            .block_on(self.backend.orchestrator().control_service(&service, action))?;

        Ok(CommandResult::success(serde_json::json!({
            "service": service,
            "action": action,
            "state": state,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TestBackend};

    #[test]
    fn test_invalid_action_rejected() {
        let harness = TestBackend::new();
        let cmd = ControlServiceCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({"service": "smb", "action": "enable"}));

        assert!(matches!(
            cmd.validate(&params),
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::InvalidParameter { .. }
            })
        ));
    }

    #[test]
    fn test_restart_runs_systemctl() {
        let harness = TestBackend::new();
        let cmd = ControlServiceCommand::new(harness.backend());
        let params =
            CommandParams::new(serde_json::json!({"service": "smb", "action": "restart"}));

        let result = cmd.execute(&context("service.control"), params).unwrap();
        assert_eq!(result.data.unwrap()["state"], "running");
        assert!(harness
            .calls()
            .iter()
            .any(|argv| argv == &["systemctl", "restart", "smbd"]));
    }
}
