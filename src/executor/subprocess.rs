//! Argument-vector subprocess execution.
//!
//! Nothing here goes through a shell: share names and paths reach checkers
//! and service managers as single argv entries.

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::{CommandErrorKind, DaemonError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Search path for checkers and service managers; the daemon's own
/// environment is not passed on.
const CHILD_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Captured outcome of one process.
#[derive(Debug, Clone, Default)]
pub struct SubprocessResult {
    /// Exit code 0.
    pub success: bool,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SubprocessResult {
    /// Combined stdout and stderr, for marker matching and diagnostics.
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Executes argument vectors on behalf of the validator and service controller.
///
/// The production implementation spawns real processes; tests substitute
/// scripted runners.
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with `argv[1..]` as arguments, bounded by `timeout`.
    ///
    /// A non-zero exit is reported through `SubprocessResult::success`, not as an
    /// error. Errors are reserved for spawn failures and timeouts
    /// (`CommandErrorKind::Timeout`).
    fn run(&self, argv: &[String], timeout: Duration) -> Result<SubprocessResult, DaemonError>;
}

/// Runs commands as child processes of the daemon.
///
/// Children get an empty stdin, a fixed `PATH` and the C locale, so the
/// output the controller and validator match on is not translated. Each
/// child leads its own process group; on timeout the whole group is killed,
/// including descendants that still hold the output pipes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> Result<SubprocessResult, DaemonError> {
        let (program, args) = argv.split_first().ok_or_else(|| execution_failed("empty command line".to_string()))?;

        debug!(
            program = %program,
            args = ?args,
            timeout_ms = timeout.as_millis() as u64,
            "Executing subprocess"
        );

        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .env("PATH", CHILD_PATH)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|e| execution_failed(format!("failed to spawn {}: {}", program, e)))?;

        // Both pipes drain concurrently so a chatty child cannot stall on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let deadline = started + timeout;
        let timed_out = || {
            warn!(program = %program, timeout_ms = timeout.as_millis() as u64, "Process timed out, killed");
            DaemonError::Command {
                kind: CommandErrorKind::Timeout {
                    timeout_secs: timeout.as_secs(),
                },
            }
        };

        let status = match wait_with_deadline(&mut child, program, deadline)? {
            Some(status) => status,
            None => return Err(timed_out()),
        };

        // A descendant that inherited a pipe keeps it open after the child exits.
        let (Some(stdout), Some(stderr)) = (collect(&stdout, deadline), collect(&stderr, deadline)) else {
            kill_group(child.id());
            return Err(timed_out());
        };

        let result = SubprocessResult {
            success: status.success(),
            exit_code: status.code(),
            stdout,
            stderr,
        };

        debug!(
            program = %program,
            exit_code = ?result.exit_code,
            duration_ms = started.elapsed().as_millis() as u64,
            "Subprocess completed"
        );

        Ok(result)
    }
}

/// Poll `child` until it exits. `None` means `deadline` passed and the
/// child's process group was killed.
fn wait_with_deadline(child: &mut Child, program: &str, deadline: Instant) -> Result<Option<ExitStatus>, DaemonError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                kill_and_reap(child);
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_and_reap(child);
                return Err(execution_failed(format!("cannot wait for {}: {}", program, e)));
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send(buf);
            });
        }
        None => {
            let _ = tx.send(Vec::new());
        }
    }
    rx
}

/// Wait for a drained pipe until `deadline`; `None` when it is still open.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Option<String> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

fn kill_group(pgid: u32) {
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill process group"),
    }
}

fn kill_and_reap(child: &mut Child) {
    kill_group(child.id());
    if let Err(e) = child.kill() {
        debug!(error = %e, "Child already gone");
    }
    let _ = child.wait();
}

fn execution_failed(message: String) -> DaemonError {
    DaemonError::Command {
        kind: CommandErrorKind::ExecutionFailed { message },
    }
}
