//! `system.ping`: liveness check.

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::DaemonError;

/// Answers without touching any service; lists the managed service ids so a
/// client can tell which daemon build it reached.
pub struct PingCommand {
    backend: Backend,
}

impl PingCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Command for PingCommand {
    fn name(&self) -> &'static str {
        "system.ping"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), DaemonError> {
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        Ok(CommandResult::success(serde_json::json!({
            "pong": true,
            "version": env!("CARGO_PKG_VERSION"),
            "request_id": ctx.request_id,
            "received_at": ctx.received_at.to_rfc3339(),
            "services": self.backend.orchestrator().registry().list(),
        })))
    }
}
