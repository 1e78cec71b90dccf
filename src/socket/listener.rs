//! Unix socket listener.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::commands::CommandRegistry;
use crate::config::{LimitsConfig, Settings};
use crate::error::{DaemonError, ProtocolErrorKind};

use super::handle_connection;

const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Connection counters, used for drain tracking and shutdown logging.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    total: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a connection as active until the returned guard is dropped.
    pub fn track(self: &Arc<Self>) -> ActiveConnection {
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveConnection {
            metrics: Arc::clone(self),
            failed: false,
        }
    }

    pub fn total_connections(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn failed_connections(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// One open connection; closing it updates the counters.
pub struct ActiveConnection {
    metrics: Arc<ConnectionMetrics>,
    failed: bool,
}

impl ActiveConnection {
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.metrics.total.fetch_add(1, Ordering::Relaxed);
        if self.failed {
            self.metrics.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.metrics.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Accepts clients on the daemon socket and serves each on its own task.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
    /// Limits handed to connections accepted from now on.
    limits: RwLock<LimitsConfig>,
    command_registry: Arc<CommandRegistry>,
    metrics: Arc<ConnectionMetrics>,
    connection_permits: Arc<Semaphore>,
    max_connections: usize,
}

impl SocketListener {
    /// Bind the socket from `settings.socket`, replacing a stale socket file.
    pub async fn bind(
        settings: &Settings,
        command_registry: Arc<CommandRegistry>,
    ) -> Result<Self, DaemonError> {
        let path = &settings.socket.path;
        let mode = parse_mode(&settings.socket.permissions)?;

        prepare_socket_path(path)?;

        let listener = UnixListener::bind(path)
            .map_err(|e| socket_error(format!("Failed to bind to socket {}: {}", path.display(), e)))?;

        // File permissions are the only access control on the socket.
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
            socket_error(format!("Failed to set permissions on {}: {}", path.display(), e))
        })?;

        let max_connections = settings.limits.max_concurrent_requests;
        info!(
            path = %path.display(),
            mode = %format!("{:o}", mode),
            max_connections,
            commands = command_registry.list_commands().len(),
            "Socket listener bound"
        );

        Ok(Self {
            listener,
            path: path.clone(),
            limits: RwLock::new(settings.limits.clone()),
            command_registry,
            metrics: Arc::new(ConnectionMetrics::new()),
            connection_permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply reloaded limits to connections accepted from now on.
    ///
    /// The connection cap is fixed at bind time.
    pub fn update_limits(&self, limits: LimitsConfig) {
        if limits.max_concurrent_requests != self.max_connections {
            warn!(
                current = self.max_connections,
                requested = limits.max_concurrent_requests,
                "Connection limit changes take effect after a restart"
            );
        }
        info!(
            max_message_size = limits.max_message_size,
            socket_timeout_seconds = limits.socket_timeout_seconds,
            "Connection limits updated"
        );
        *self.limits.write().unwrap_or_else(|e| e.into_inner()) = limits;
    }

    fn current_limits(&self) -> LimitsConfig {
        self.limits
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Connections already being served keep running; see
    /// [`wait_for_drain`](Self::wait_for_drain).
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), DaemonError> {
        info!("Accepting connections");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => self.serve(stream),
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                _ = shutdown.notified() => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }

    /// Spawn a task for `stream`, or drop it when every permit is taken.
    fn serve(&self, stream: UnixStream) {
        let Ok(permit) = Arc::clone(&self.connection_permits).try_acquire_owned() else {
            warn!(max = self.max_connections, "Connection limit reached, rejecting client");
            return;
        };

        let limits = self.current_limits();
        let registry = Arc::clone(&self.command_registry);
        let mut connection = self.metrics.track();
        debug!(active = self.metrics.active(), "Connection accepted");

        tokio::spawn(async move {
            let _permit = permit;
            match handle_connection(stream, limits, registry).await {
                Ok(()) => {}
                Err(DaemonError::Protocol {
                    kind: ProtocolErrorKind::ConnectionClosed,
                }) => {}
                Err(e) => {
                    error!(error = %e, "Connection handler error");
                    connection.mark_failed();
                }
            }
        });
    }

    /// Wait until no connection is being served.
    pub async fn wait_for_drain(&self) {
        while self.metrics.active() > 0 {
            debug!(active = self.metrics.active(), "Waiting for connections to drain");
            tokio::time::sleep(DRAIN_POLL).await;
        }

        info!(
            connections_total = self.metrics.total_connections(),
            connections_failed = self.metrics.failed_connections(),
            "All connections drained"
        );
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Socket file not removed");
        }
    }
}

/// Octal mode string such as `"0660"`.
fn parse_mode(permissions: &str) -> Result<u32, DaemonError> {
    u32::from_str_radix(permissions, 8)
        .ok()
        .filter(|mode| *mode <= 0o777)
        .ok_or_else(|| socket_error(format!("Invalid socket permissions '{}'", permissions)))
}

/// Remove a stale socket file and create the parent directory.
///
/// A symlink at `path` is refused rather than removed.
fn prepare_socket_path(path: &Path) -> Result<(), DaemonError> {
    if let Ok(metadata) = fs::symlink_metadata(path) {
        if metadata.file_type().is_symlink() {
            return Err(socket_error(format!(
                "Socket path {} is a symlink, refusing to remove it",
                path.display()
            )));
        }
        fs::remove_file(path).map_err(|e| {
            socket_error(format!("Failed to remove stale socket {}: {}", path.display(), e))
        })?;
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            socket_error(format!(
                "Failed to create socket directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    Ok(())
}

fn socket_error(message: String) -> DaemonError {
    DaemonError::Socket { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::TestBackend;

    #[test]
    fn test_metrics_track_connections() {
        let metrics = Arc::new(ConnectionMetrics::new());
        {
            let _a = metrics.track();
            let mut b = metrics.track();
            b.mark_failed();
            assert_eq!(metrics.active(), 2);
        }

        assert_eq!(metrics.active(), 0);
        assert_eq!(metrics.total_connections(), 2);
        assert_eq!(metrics.failed_connections(), 1);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0660").unwrap(), 0o660);
        assert_eq!(parse_mode("600").unwrap(), 0o600);
        assert!(parse_mode("0999").is_err());
        assert!(parse_mode("rw-rw----").is_err());
        assert!(parse_mode("7777").is_err());
    }

    #[test]
    fn test_bind_replaces_stale_socket_and_cleans_up() {
        let harness = TestBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.socket.path = dir.path().join("run/daemon.sock");
        settings.socket.permissions = "0660".to_string();

        fs::create_dir_all(dir.path().join("run")).unwrap();
        fs::write(&settings.socket.path, "stale").unwrap();

        let registry = Arc::new(CommandRegistry::new(harness.backend()));
        let listener = harness
            .block_on(SocketListener::bind(&settings, registry))
            .unwrap();

        let mode = fs::metadata(listener.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o660);

        let path = listener.path().to_path_buf();
        harness.block_on(async move { drop(listener) });
        assert!(!path.exists());
    }

    #[test]
    fn test_bind_refuses_symlink() {
        let harness = TestBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("important");
        fs::write(&target, "keep me").unwrap();

        let mut settings = Settings::default();
        settings.socket.path = dir.path().join("daemon.sock");
        std::os::unix::fs::symlink(&target, &settings.socket.path).unwrap();

        let registry = Arc::new(CommandRegistry::new(harness.backend()));
        let result = harness.block_on(SocketListener::bind(&settings, registry));

        assert!(matches!(result, Err(DaemonError::Socket { .. })));
        assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
    }
}
