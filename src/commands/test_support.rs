//! Fixtures shared by command tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::DaemonError;
use crate::executor::{CommandRunner, SubprocessResult};
use crate::orchestrator::Orchestrator;
use crate::services::{builtin, ConfigCheck, ServiceRegistry};

use super::backend::Backend;
use super::types::ExecutionContext;

/// Every service reports `active`; every other command succeeds.
#[derive(Default)]
pub(crate) struct HealthySystemctl {
    calls: Mutex<Vec<Vec<String>>>,
}

impl CommandRunner for HealthySystemctl {
    fn run(&self, argv: &[String], _timeout: Duration) -> Result<SubprocessResult, DaemonError> {
        self.calls.lock().unwrap().push(argv.to_vec());
        let stdout = if argv.get(1).map(String::as_str) == Some("is-active") {
            "active\n"
        } else {
            ""
        };
        Ok(SubprocessResult {
            success: true,
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }
}

/// An orchestrator whose live files and snapshots live in a temp directory.
pub(crate) struct TestBackend {
    dir: TempDir,
    runner: Arc<HealthySystemctl>,
    backend: Backend,
    // Declared last so the backend's handle is dropped first.
    runtime: Runtime,
}

impl TestBackend {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new().unwrap();

        let profiles = [
            builtin::samba(),
            builtin::nfs(),
            builtin::vsftpd(),
            builtin::nginx(),
        ]
        .into_iter()
        .map(|profile| {
            let live = dir.path().join(format!("{}.conf", profile.id));
            profile.with_live_path(live).with_check(ConfigCheck::None)
        })
        .collect();

        let mut settings = Settings::default();
        settings.backup.dir = dir.path().join("snapshots");
        settings.paths.require_existing_share_paths = false;
        settings.timeouts.verify_grace_seconds = 1;
        settings.timeouts.verify_poll_millis = 10;

        let runner = Arc::new(HealthySystemctl::default());
        let orchestrator = Orchestrator::builder(
            &settings,
            Arc::new(ServiceRegistry::with_profiles(profiles)),
            runner.clone(),
        )
        .build()
        .unwrap();

        let backend = Backend::new(orchestrator, runtime.handle().clone());
        Self {
            dir,
            runner,
            backend,
            runtime,
        }
    }

    pub(crate) fn backend(&self) -> Backend {
        self.backend.clone()
    }

    pub(crate) fn live_path(&self, service: &str) -> PathBuf {
        self.dir.path().join(format!("{}.conf", service))
    }

    /// Drive `future` on the backend's runtime from a plain test thread.
    pub(crate) fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.runner.calls.lock().unwrap().clone()
    }
}

pub(crate) fn context(command: &str) -> ExecutionContext {
    ExecutionContext::new(Uuid::new_v4(), command)
}
