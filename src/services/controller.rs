//! Service controller.
//!
//! Wraps start/stop/restart/reload/status behind one result type regardless
//! of how each service manager reports success.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CommandErrorKind, DaemonError, ServiceErrorKind};
use crate::executor::{sanitize_output, CommandRunner, SubprocessResult};

use super::profile::{ReloadStrategy, ServiceProfile};
use super::state::{ServiceAction, ServiceState};

/// Output fragments meaning "this unit cannot reload".
const RELOAD_UNSUPPORTED_MARKERS: &[&str] = &[
    "Job type reload is not applicable",
    "does not support reload",
    "reload is not supported",
];

/// Lines of command output kept in error messages.
const MAX_DIAGNOSTIC_LINES: usize = 20;

/// Runs service manager commands for registered services.
#[derive(Clone)]
pub struct ServiceController {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl ServiceController {
    /// Create a controller; every call is bounded by `timeout`.
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Perform `action` and return the state observed afterwards.
    ///
    /// `Status` never mutates. `Reload` on a service whose strategy is
    /// `Restart` fails with `ReloadUnsupported` without running anything.
    pub fn control(
        &self,
        profile: &ServiceProfile,
        action: ServiceAction,
    ) -> Result<ServiceState, DaemonError> {
        if action == ServiceAction::Status {
            return self.status(profile);
        }

        if action == ServiceAction::Reload && profile.reload_strategy == ReloadStrategy::Restart {
            return Err(DaemonError::service(ServiceErrorKind::ReloadUnsupported {
                unit: profile.unit.clone(),
            }));
        }

        debug!(service = profile.id, unit = %profile.unit, action = %action, "Controlling service");

        let result = self.run(profile, action)?;

        if !result.success {
            let output = result.combined_output();
            if action == ServiceAction::Reload
                && RELOAD_UNSUPPORTED_MARKERS.iter().any(|m| output.contains(m))
            {
                return Err(DaemonError::service(ServiceErrorKind::ReloadUnsupported {
                    unit: profile.unit.clone(),
                }));
            }

            warn!(
                service = profile.id,
                action = %action,
                exit_code = ?result.exit_code,
                "Service command failed"
            );
            return Err(DaemonError::service(ServiceErrorKind::ControlError {
                unit: profile.unit.clone(),
                action: action.to_string(),
                message: format!(
                    "exit code {}: {}",
                    result
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    sanitize_output(&output, MAX_DIAGNOSTIC_LINES)
                ),
            }));
        }

        info!(service = profile.id, action = %action, "Service command succeeded");

        self.status(profile)
    }

    /// Query the current state. Never mutates the service.
    pub fn status(&self, profile: &ServiceProfile) -> Result<ServiceState, DaemonError> {
        // `is-active` exits non-zero for anything but "active"; the printed state is what counts.
        let result = self.run(profile, ServiceAction::Status)?;
        let state = ServiceState::from_is_active(&result.stdout);
        debug!(service = profile.id, state = %state, "Service status retrieved");
        Ok(state)
    }

    fn run(
        &self,
        profile: &ServiceProfile,
        action: ServiceAction,
    ) -> Result<SubprocessResult, DaemonError> {
        let argv = profile.control_argv(action);
        self.runner.run(&argv, self.timeout).map_err(|e| match e {
            DaemonError::Command {
                kind: CommandErrorKind::Timeout { .. },
            } => DaemonError::service(ServiceErrorKind::ControlTimeout {
                unit: profile.unit.clone(),
                action: action.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }),
            other => DaemonError::service(ServiceErrorKind::ControlError {
                unit: profile.unit.clone(),
                action: action.to_string(),
                message: other.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{samba, vsftpd};
    use std::sync::Mutex;

    /// Replies to each argv by matching its second element.
    struct FakeSystemctl {
        calls: Mutex<Vec<Vec<String>>>,
        reply: fn(&[String]) -> Result<SubprocessResult, DaemonError>,
    }

    impl FakeSystemctl {
        fn new(reply: fn(&[String]) -> Result<SubprocessResult, DaemonError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    impl CommandRunner for FakeSystemctl {
        fn run(&self, argv: &[String], _timeout: Duration) -> Result<SubprocessResult, DaemonError> {
            self.calls.lock().unwrap().push(argv.to_vec());
            (self.reply)(argv)
        }
    }

    fn ok(stdout: &str) -> Result<SubprocessResult, DaemonError> {
        Ok(SubprocessResult {
            success: true,
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn fail(stderr: &str) -> Result<SubprocessResult, DaemonError> {
        Ok(SubprocessResult {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn test_status_parses_inactive_without_error() {
        let runner = FakeSystemctl::new(|_| {
            Ok(SubprocessResult {
                success: false,
                exit_code: Some(3),
                stdout: "inactive\n".to_string(),
                stderr: String::new(),
            })
        });
        let controller = ServiceController::new(runner, Duration::from_secs(1));
        let state = controller.status(&samba::profile()).unwrap();
        assert_eq!(state, ServiceState::Stopped);
    }

    #[test]
    fn test_restart_then_status() {
        let runner = FakeSystemctl::new(|argv| match argv[1].as_str() {
            "is-active" => ok("active\n"),
            _ => ok(""),
        });
        let controller = ServiceController::new(runner.clone(), Duration::from_secs(1));
        let state = controller
            .control(&samba::profile(), ServiceAction::Restart)
            .unwrap();
        assert_eq!(state, ServiceState::Running);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0], vec!["systemctl", "restart", "smbd"]);
        assert_eq!(calls[1], vec!["systemctl", "is-active", "smbd"]);
    }

    #[test]
    fn test_reload_unsupported_marker() {
        let runner = FakeSystemctl::new(|_| {
            fail("Failed to reload smbd.service: Job type reload is not applicable for unit smbd.service.")
        });
        let controller = ServiceController::new(runner, Duration::from_secs(1));
        let result = controller.control(&samba::profile(), ServiceAction::Reload);
        assert!(matches!(
            result,
            Err(DaemonError::Service {
                kind: ServiceErrorKind::ReloadUnsupported { .. }
            })
        ));
    }

    #[test]
    fn test_reload_on_restart_only_service_runs_nothing() {
        let runner = FakeSystemctl::new(|_| ok(""));
        let controller = ServiceController::new(runner.clone(), Duration::from_secs(1));
        let result = controller.control(&vsftpd::profile(), ServiceAction::Reload);
        assert!(matches!(
            result,
            Err(DaemonError::Service {
                kind: ServiceErrorKind::ReloadUnsupported { .. }
            })
        ));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_control_error_carries_output() {
        let runner = FakeSystemctl::new(|_| fail("Unit smbd.service not found."));
        let controller = ServiceController::new(runner, Duration::from_secs(1));
        let err = controller
            .control(&samba::profile(), ServiceAction::Start)
            .unwrap_err();
        assert_eq!(err.code(), "CONTROL_ERROR");
        assert!(err.to_string().contains("Unit smbd.service not found."));
    }

    #[test]
    fn test_timeout_maps_to_control_timeout() {
        let runner = FakeSystemctl::new(|_| {
            Err(DaemonError::Command {
                kind: CommandErrorKind::Timeout { timeout_secs: 15 },
            })
        });
        let controller = ServiceController::new(runner, Duration::from_secs(15));
        let err = controller
            .control(&samba::profile(), ServiceAction::Stop)
            .unwrap_err();
        assert_eq!(err.code(), "CONTROL_TIMEOUT");
    }
}
