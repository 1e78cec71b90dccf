//! Shared fixtures for integration tests: a scripted service manager and an
//! orchestrator whose live files live in a temp directory.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use share_daemon::config::Settings;
use share_daemon::error::{CommandErrorKind, DaemonError};
use share_daemon::executor::{CommandRunner, SubprocessResult};
use share_daemon::files::ConfigWriter;
use share_daemon::orchestrator::Orchestrator;
use share_daemon::services::{builtin, ConfigCheck, ServiceProfile, ServiceRegistry};
use share_daemon::shares::ShareSpec;

/// Share path the scripted checker rejects.
pub const MALFORMED_PATH: &str = "/srv/malformed";
/// Share path that passes the check but makes the service fail to start.
pub const CRASHING_PATH: &str = "/srv/crashes";
/// Share path whose service accepts the start but never becomes active.
pub const STALLING_PATH: &str = "/srv/stalls";
/// Share path the scripted checker never finishes on.
pub const SLOW_CHECK_PATH: &str = "/srv/slow-check";

/// Checker argv[0] used by the test profiles.
const CHECKER: &str = "check-config";

/// A fake host: `systemctl`, `exportfs` and a config checker whose behavior
/// depends on the live files they would read.
pub struct FakeHost {
    live: HashMap<String, PathBuf>,
    states: Mutex<HashMap<String, &'static str>>,
    broken: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeHost {
    fn new(profiles: &[ServiceProfile]) -> Self {
        Self {
            live: profiles
                .iter()
                .map(|p| (p.unit.clone(), p.live_path.clone()))
                .collect(),
            states: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose argv starts with `prefix`.
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|argv| argv.len() >= prefix.len() && argv.iter().zip(prefix).all(|(a, b)| a == b))
            .count()
    }

    pub fn set_state(&self, unit: &str, state: &'static str) {
        self.states.lock().unwrap().insert(unit.to_string(), state);
    }

    /// Make every later restart of `unit` fail, whatever its live file says.
    pub fn break_restarts(&self, unit: &str) {
        self.broken.lock().unwrap().insert(unit.to_string());
    }

    fn state(&self, unit: &str) -> &'static str {
        self.states.lock().unwrap().get(unit).copied().unwrap_or("active")
    }

    /// Start the unit on whatever its live file currently says.
    fn start(&self, unit: &str) -> SubprocessResult {
        let content = self
            .live
            .get(unit)
            .and_then(|path| std::fs::read_to_string(path).ok())
            .unwrap_or_default();

        if content.contains(STALLING_PATH) {
            self.set_state(unit, "activating");
            success("")
        } else if content.contains(CRASHING_PATH) {
            self.set_state(unit, "failed");
            failure(
                1,
                &format!("Job for {}.service failed because the control process exited with error code.", unit),
            )
        } else {
            self.set_state(unit, "active");
            success("")
        }
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, argv: &[String], _timeout: Duration) -> Result<SubprocessResult, DaemonError> {
        self.calls.lock().unwrap().push(argv.to_vec());
        let arg = |i: usize| argv.get(i).map(String::as_str).unwrap_or("");

        let result = match arg(0) {
            "systemctl" => match arg(1) {
                "is-active" => {
                    let state = self.state(arg(2));
                    SubprocessResult {
                        success: state == "active",
                        exit_code: Some(if state == "active" { 0 } else { 3 }),
                        stdout: format!("{}\n", state),
                        stderr: String::new(),
                    }
                }
                "restart" if self.broken.lock().unwrap().contains(arg(2)) => {
                    self.set_state(arg(2), "failed");
                    failure(1, &format!("Job for {}.service failed.", arg(2)))
                }
                "reload" | "restart" | "start" => self.start(arg(2)),
                "stop" => {
                    self.set_state(arg(2), "inactive");
                    success("")
                }
                other => failure(1, &format!("Unknown command verb {}.", other)),
            },
            "exportfs" => self.start("nfs-server"),
            CHECKER => {
                let candidate = std::fs::read_to_string(arg(1)).unwrap_or_default();
                if candidate.contains(SLOW_CHECK_PATH) {
                    return Err(DaemonError::Command {
                        kind: CommandErrorKind::Timeout { timeout_secs: 10 },
                    });
                }
                if candidate.contains(MALFORMED_PATH) {
                    failure(1, &format!("{}: bad option list near line 2", arg(1)))
                } else {
                    success("Loaded services file OK.\n")
                }
            }
            other => failure(127, &format!("{}: command not found", other)),
        };
        Ok(result)
    }
}

fn success(stdout: &str) -> SubprocessResult {
    SubprocessResult {
        success: true,
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failure(code: i32, stderr: &str) -> SubprocessResult {
    SubprocessResult {
        success: false,
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Orchestrator over the four built-in services, relocated into a temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub host: Arc<FakeHost>,
    pub orchestrator: Orchestrator,
    pub settings: Settings,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None, |_| {})
    }

    /// Use `writer` instead of the atomic file writer.
    pub fn with_writer(writer: Arc<dyn ConfigWriter>) -> Self {
        Self::build(Some(writer), |_| {})
    }

    /// Adjust the settings before the orchestrator is built.
    pub fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        Self::build(None, configure)
    }

    fn build(writer: Option<Arc<dyn ConfigWriter>>, configure: impl FnOnce(&mut Settings)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let checker = ConfigCheck::Command(vec![CHECKER.to_string(), "{config}".to_string()]);

        let profiles: Vec<ServiceProfile> = [
            builtin::samba(),
            builtin::nfs(),
            builtin::vsftpd(),
            builtin::nginx(),
        ]
        .into_iter()
        .map(|profile| {
            let live = dir.path().join("etc").join(profile.id).join("live.conf");
            profile.with_live_path(live).with_check(checker.clone())
        })
        .collect();

        let host = Arc::new(FakeHost::new(&profiles));

        let mut settings = Settings::default();
        settings.backup.dir = dir.path().join("snapshots");
        settings.backup.retention = 5;
        settings.paths.require_existing_share_paths = false;
        settings.timeouts.verify_grace_seconds = 1;
        settings.timeouts.verify_poll_millis = 10;
        settings.audit.log_path = dir.path().join("audit.log");
        configure(&mut settings);

        let registry = Arc::new(ServiceRegistry::with_profiles(profiles));
        let mut builder = Orchestrator::builder(&settings, registry, host.clone());
        if let Some(writer) = writer {
            builder = builder.writer(writer);
        }
        let orchestrator = builder.build().unwrap();

        Self {
            dir,
            host,
            orchestrator,
            settings,
        }
    }

    pub fn live_path(&self, service: &str) -> PathBuf {
        self.orchestrator.registry().get(service).unwrap().live_path.clone()
    }

    pub fn write_live(&self, service: &str, content: &str) {
        let path = self.live_path(service);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn read_live(&self, service: &str) -> Option<String> {
        read_optional(&self.live_path(service))
    }
}

pub fn read_optional(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

pub fn share(name: &str, path: &str) -> ShareSpec {
    ShareSpec::new(name, path)
}
