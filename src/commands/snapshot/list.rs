//! Snapshot history listing.

use crate::commands::backend::Backend;
use crate::commands::traits::Command;
use crate::commands::types::{CommandParams, CommandResult, ExecutionContext};
use crate::error::DaemonError;

/// List a service's snapshots, most recent first.
///
/// File contents are omitted unless `include_content` is true.
pub struct ListSnapshotsCommand {
    backend: Backend,
}

impl ListSnapshotsCommand {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Command for ListSnapshotsCommand {
    fn name(&self) -> &'static str {
        "snapshot.list"
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
        let include_content = params.get_optional_bool("include_content", false);

        let snapshots = self.backend.orchestrator().list_snapshots(&service)?;
        let entries: Vec<serde_json::Value> = snapshots
            .into_iter()
            .map(|mut snapshot| {
                if !include_content {
                    snapshot.content = None;
                }
                serde_json::json!({
                    "id": snapshot.id,
                    "live_path": snapshot.live_path,
                    "content_hash": snapshot.content_hash,
                    "absent": snapshot.content_hash.is_none(),
                    "taken_at": snapshot.taken_at.to_rfc3339(),
                    "content": snapshot.content,
                })
            })
            .collect();

        Ok(CommandResult::success(serde_json::json!({
            "service": service,
            "snapshots": entries,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TestBackend};

    #[test]
    fn test_empty_history() {
        let harness = TestBackend::new();
        let cmd = ListSnapshotsCommand::new(harness.backend());
        let params = CommandParams::new(serde_json::json!({"service": "nginx"}));

        let result = cmd.execute(&context("snapshot.list"), params).unwrap();
        let data = result.data.unwrap();
        assert!(data["snapshots"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_history_hides_content_by_default() {
        let harness = TestBackend::new();
        let live = harness.live_path("nginx");
        std::fs::write(&live, "events {}\n").unwrap();
        harness
            .backend()
            .orchestrator()
            .store()
            .snapshot("nginx", &live)
            .unwrap();

        let cmd = ListSnapshotsCommand::new(harness.backend());
        let result = cmd
            .execute(
                &context("snapshot.list"),
                CommandParams::new(serde_json::json!({"service": "nginx"})),
            )
            .unwrap();
        let first = &result.data.unwrap()["snapshots"][0];
        assert_eq!(first["id"], 1);
        assert_eq!(first["absent"], false);
        assert!(first["content"].is_null());

        let result = cmd
            .execute(
                &context("snapshot.list"),
                CommandParams::new(serde_json::json!({"service": "nginx", "include_content": true})),
            )
            .unwrap();
        assert_eq!(result.data.unwrap()["snapshots"][0]["content"], "events {}\n");
    }
}
