//! Validator dispatch.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{CommandErrorKind, DaemonError, ServiceErrorKind};
use crate::executor::{find_marker, sanitize_output, CommandRunner};
use crate::services::{ConfigCheck, ServiceProfile};

use super::{check_exports, check_key_value};

/// Lines of checker output kept in a `SyntaxError`.
const MAX_DIAGNOSTIC_LINES: usize = 30;

/// File name used when the live path has none.
const FALLBACK_FILE_NAME: &str = "candidate.conf";

/// Checks candidate configuration text without touching the live file.
#[derive(Clone)]
pub struct Validator {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl Validator {
    /// Create a validator; checker commands are bounded by `timeout`.
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Check `candidate` as a configuration file for `profile`.
    ///
    /// The candidate is written to a private temporary directory under the
    /// live file's name, so checkers that look at the extension behave the
    /// same as on the real file.
    pub fn validate(&self, profile: &ServiceProfile, candidate: &str) -> Result<(), DaemonError> {
        let start = Instant::now();

        let result = match &profile.check {
            ConfigCheck::None => {
                debug!(service = profile.id, "No syntax check for service");
                Ok(())
            }
            ConfigCheck::Exports => check_exports(candidate).map_err(syntax_error),
            ConfigCheck::KeyValue => check_key_value(candidate).map_err(syntax_error),
            ConfigCheck::Command(_) => self.run_checker(profile, candidate),
        };

        match &result {
            Ok(()) => info!(
                service = profile.id,
                duration_ms = start.elapsed().as_millis() as u64,
                "Candidate configuration passed syntax check"
            ),
            Err(e) => warn!(service = profile.id, error = %e, "Candidate configuration rejected"),
        }

        result
    }

    fn run_checker(&self, profile: &ServiceProfile, candidate: &str) -> Result<(), DaemonError> {
        let scratch = tempfile::Builder::new()
            .prefix("share-daemon-check-")
            .tempdir()?;

        let file_name = profile
            .live_path
            .file_name()
            .unwrap_or_else(|| Path::new(FALLBACK_FILE_NAME).as_os_str());
        let candidate_path = scratch.path().join(file_name);
        fs::write(&candidate_path, candidate)?;

        let argv = profile
            .check_argv(&candidate_path.to_string_lossy())
            .unwrap_or_default();

        debug!(service = profile.id, argv = ?argv, "Running syntax checker");

        let result = self.runner.run(&argv, self.timeout).map_err(|e| match e {
            DaemonError::Command {
                kind: CommandErrorKind::Timeout { .. },
            } => DaemonError::service(ServiceErrorKind::ValidationTimeout {
                timeout_secs: self.timeout.as_secs(),
            }),
            // A checker that cannot run cannot vouch for the candidate.
            other => syntax_error(format!("syntax checker could not run: {}", other)),
        })?;

        let output = result.combined_output();

        if !result.success {
            return Err(syntax_error(format!(
                "checker exited with code {}\n{}",
                result
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                sanitize_output(&output, MAX_DIAGNOSTIC_LINES)
            )));
        }

        if let Some(marker) = find_marker(&output, &profile.error_markers) {
            return Err(syntax_error(format!(
                "checker reported '{}'\n{}",
                marker,
                sanitize_output(&output, MAX_DIAGNOSTIC_LINES)
            )));
        }

        Ok(())
    }
}

fn syntax_error(details: String) -> DaemonError {
    DaemonError::service(ServiceErrorKind::SyntaxError { details })
}
