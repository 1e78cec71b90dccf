//! Dry-run rendering.

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::DaemonError;
use crate::shares::{GlobalOptions, ShareSpec};

/// `shares.render`: render (and optionally syntax-check) a share list
/// without touching the live file or the service.
pub struct RenderSharesCommand {
    backend: Backend,
}

impl RenderSharesCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Command for RenderSharesCommand {
    fn name(&self) -> &'static str {
        "shares.render"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError> {
        params.require_string("service")
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let service = params.get_string("service")?;
        let specs: Vec<ShareSpec> = params.get_typed_or_default("specs")?;
        let options: GlobalOptions = params.get_typed_or_default("options")?;
        let validate = params.get_optional_bool("validate", false);

        let rendered = self
            .backend
            .orchestrator()
            .preview(&service, &specs, &options, validate)?;

        Ok(CommandResult::success(serde_json::json!({
            "service": rendered.service(),
            "content": rendered.content(),
            "content_hash": rendered.content_hash(),
            "shares": rendered.specs().len(),
            "validated": validate,
            "generated_at": rendered.generated_at().to_rfc3339(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TestBackend};

    #[test]
    fn test_render_does_not_touch_live_file() {
        let harness = TestBackend::new();
        let cmd = RenderSharesCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({
            "service": "smb",
            "specs": [{"name": "docs", "path": "/srv/docs", "read_only": true}],
            "validate": true
        }));

        let result = cmd.execute(&context("shares.render"), params).unwrap();
        let data = result.data.unwrap();
        assert!(data["content"].as_str().unwrap().contains("[docs]"));
        assert_eq!(data["shares"], 1);
        assert_eq!(data["validated"], true);
        assert_eq!(data["content_hash"].as_str().unwrap().len(), 64);

        assert!(!harness.live_path("smb").exists());
        assert!(harness.calls().is_empty());
    }

    #[test]
    fn test_render_rejects_invalid_spec() {
        let harness = TestBackend::new();
        let cmd = RenderSharesCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({
            "service": "smb",
            "specs": [{"name": "docs", "path": "relative/path"}]
        }));

        assert!(cmd.execute(&context("shares.render"), params).is_err());
    }
}
