//! Share Daemon - renders, validates, applies and rolls back file-sharing
//! service configuration, driven over a Unix socket or from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::signal;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use share_daemon::audit::AuditLogger;
use share_daemon::commands::{Backend, CommandRegistry};
use share_daemon::config::Settings;
use share_daemon::error::DaemonError;
use share_daemon::executor::SystemRunner;
use share_daemon::orchestrator::Orchestrator;
use share_daemon::services::ServiceRegistry;
use share_daemon::shares::{GlobalOptions, ShareSpec};
use share_daemon::socket::SocketListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/share-daemon/daemon.toml";

/// Configuration lifecycle manager for Samba, NFS, FTP and Nginx shares
#[derive(Parser)]
#[command(name = "share-daemon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file [default: /etc/share-daemon/daemon.toml]
    #[arg(short, long, global = true, env = "SHARE_DAEMON_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon on its Unix socket (default)
    Serve,

    /// Render, validate, back up, apply and reload one service
    Apply {
        /// Service id (smb, nfs, ftp, nginx)
        #[arg(long)]
        service: String,

        /// JSON file: a list of shares, or {"specs": [...], "options": {...}}
        #[arg(long, value_name = "FILE")]
        specs: PathBuf,
    },

    /// Print the rendered configuration without changing anything
    Render {
        #[arg(long)]
        service: String,

        #[arg(long, value_name = "FILE")]
        specs: PathBuf,

        /// Also run the service's syntax check on the result
        #[arg(long)]
        validate: bool,
    },

    /// Show the current state of a service
    Status {
        #[arg(long)]
        service: String,
    },

    /// Restore the latest snapshot of a service and reload it
    Rollback {
        #[arg(long)]
        service: String,
    },

    /// List the snapshot history of a service
    Snapshots {
        #[arg(long)]
        service: String,
    },
}

/// Share list file accepted by `apply` and `render`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SpecFile {
    Full {
        specs: Vec<ShareSpec>,
        #[serde(default)]
        options: GlobalOptions,
    },
    List(Vec<ShareSpec>),
}

impl SpecFile {
    fn load(path: &Path) -> Result<(Vec<ShareSpec>, GlobalOptions), DaemonError> {
        let text = std::fs::read_to_string(path).map_err(|e| DaemonError::Config {
            message: format!("Failed to read share file '{}': {}", path.display(), e),
        })?;
        let parsed: SpecFile = serde_json::from_str(&text)?;
        Ok(match parsed {
            SpecFile::Full { specs, options } => (specs, options),
            SpecFile::List(specs) => (specs, GlobalOptions::default()),
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (settings, config_path) = match load_settings(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Commands::Serve);
    let result = runtime.block_on(async move {
        match command {
            Commands::Serve => serve(settings, config_path).await,
            other => run_cli(settings, other).await,
        }
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, code = e.code(), "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration file, falling back to defaults when the default
/// path does not exist.
fn load_settings(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>), DaemonError> {
    match explicit {
        Some(path) => Ok((Settings::load(path)?, Some(path.to_path_buf()))),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                Ok((Settings::load(&path)?, Some(path)))
            } else {
                Ok((Settings::default(), None))
            }
        }
    }
}

/// Assemble the service registry, audit log and orchestrator from settings.
fn build_orchestrator(settings: &Settings) -> Result<Orchestrator, DaemonError> {
    let registry = Arc::new(ServiceRegistry::from_overrides(&settings.services)?);
    let builder = Orchestrator::builder(settings, registry, Arc::new(SystemRunner));

    let builder = if settings.audit.enabled {
        match AuditLogger::open(&settings.audit.log_path) {
            Ok(logger) => {
                info!(path = %settings.audit.log_path.display(), "Audit logging enabled");
                builder.audit(Arc::new(logger))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %settings.audit.log_path.display(),
                    "Failed to open audit log, audit logging disabled"
                );
                builder
            }
        }
    } else {
        info!("Audit logging disabled");
        builder
    };

    builder.build()
}

/// Run the socket daemon until SIGTERM/SIGINT.
async fn serve(settings: Settings, config_path: Option<PathBuf>) -> Result<ExitCode, DaemonError> {
    info!("Starting {} v{}", NAME, VERSION);
    match &config_path {
        Some(path) => info!("Configuration loaded from: {}", path.display()),
        None => warn!("No configuration file found, using defaults"),
    }
    info!("Socket path: {}", settings.socket.path.display());
    info!("Log level: {}", settings.logging.level);

    let orchestrator = build_orchestrator(&settings)?;
    let backend = Backend::new(orchestrator, tokio::runtime::Handle::current());
    let registry = Arc::new(CommandRegistry::new(backend));
    let listener = SocketListener::bind(&settings, registry).await?;

    let shutdown = Arc::new(Notify::new());
    let shutdown_for_run = Arc::clone(&shutdown);

    let run = listener.run(shutdown_for_run);
    tokio::pin!(run);

    loop {
        tokio::select! {
            result = &mut run => {
                if let Err(e) = result {
                    error!(error = %e, "Socket listener failed");
                    return Err(e);
                }
                break;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.notify_waiters();

                // In-flight runs finish on their blocking workers; wait for their connections.
                let drain_timeout = Duration::from_secs(30);
                match tokio::time::timeout(drain_timeout, listener.wait_for_drain()).await {
                    Ok(()) => info!("Graceful shutdown complete"),
                    Err(_) => warn!(
                        "Shutdown timeout after {}s, some connections may be terminated",
                        drain_timeout.as_secs()
                    ),
                }
                break;
            }
            _ = reload_signal() => {
                let Some(path) = &config_path else {
                    warn!("Reload signal received but no configuration file is in use");
                    continue;
                };
                info!("Reload signal received, reloading configuration...");
                match Settings::load(path) {
                    Ok(new_settings) => {
                        listener.update_limits(new_settings.limits);
                        info!("Connection limits reloaded; other settings apply after a restart");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to reload configuration, keeping existing settings");
                    }
                }
            }
        }
    }

    info!("Daemon stopped");
    Ok(ExitCode::SUCCESS)
}

/// One-shot subcommands, run in-process against the live system.
async fn run_cli(settings: Settings, command: Commands) -> Result<ExitCode, DaemonError> {
    let orchestrator = build_orchestrator(&settings)?;

    match command {
        Commands::Serve => Err(DaemonError::Config {
            message: "serve is not a one-shot command".to_string(),
        }),
        Commands::Apply { service, specs } => {
            let (specs, options) = SpecFile::load(&specs)?;

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling run if it has not reached backup yet");
                    trigger.cancel();
                }
            });

            let result = orchestrator
                .apply_configuration_with_cancel(&service, specs, options, cancel)
                .await;
            print_json(&result)?;
            Ok(if result.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Render {
            service,
            specs,
            validate,
        } => {
            let (specs, options) = SpecFile::load(&specs)?;
            let rendered = tokio::task::spawn_blocking(move || {
                orchestrator.preview(&service, &specs, &options, validate)
            })
            .await
            .map_err(|e| DaemonError::Config {
                message: format!("Render task failed: {}", e),
            })??;
            print!("{}", rendered.content());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { service } => {
            let state = orchestrator.get_service_status(&service).await?;
            println!("{} {}", service, state);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rollback { service } => {
            let report = orchestrator.rollback_service(&service).await?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Snapshots { service } => {
            for snapshot in orchestrator.list_snapshots(&service)? {
                println!(
                    "{:>6}  {}  {}",
                    snapshot.id,
                    snapshot.taken_at.to_rfc3339(),
                    snapshot.content_hash.as_deref().unwrap_or("(absent)")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), DaemonError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for a reload signal (SIGHUP).
async fn reload_signal() {
    match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize logging based on settings. Logs go to stderr so CLI output
/// on stdout stays machine-readable.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_falls_back_to_environment() {
        let command = Cli::command();
        let config = command
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        assert_eq!(
            config.get_env().and_then(|v| v.to_str()),
            Some("SHARE_DAEMON_CONFIG")
        );
    }

    #[test]
    fn test_apply_arguments() {
        let cli = Cli::try_parse_from([
            "share-daemon",
            "--config",
            "/tmp/daemon.toml",
            "apply",
            "--service",
            "smb",
            "--specs",
            "/tmp/shares.json",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/daemon.toml")));
        assert!(matches!(cli.command, Some(Commands::Apply { .. })));
    }
}
