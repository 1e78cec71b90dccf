//! List managed services.

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::DaemonError;

/// Describe every registered service record.
pub struct ListServicesCommand {
    backend: Backend,
}

impl ListServicesCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Command for ListServicesCommand {
    fn name(&self) -> &'static str {
        "service.list"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), DaemonError> {
        Ok(())
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let registry = self.backend.orchestrator().registry();

        let services = registry
            .list()
            .into_iter()
            .map(|id| {
                let profile = registry.get(id)?;
                Ok(serde_json::json!({
                    "id": profile.id,
                    "name": profile.display_name,
                    "protocol": profile.protocol,
                    "unit": profile.unit,
                    "live_path": profile.live_path,
                    "reload_strategy": profile.reload_strategy,
                }))
            })
            .collect::<Result<Vec<_>, DaemonError>>()?;

        Ok(CommandResult::success(serde_json::json!({
            "count": services.len(),
            "services": services,
        })))
    }
}
