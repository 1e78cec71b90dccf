//! Configuration settings for the share daemon.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::DaemonError;
use crate::services::ReloadStrategy;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Per-service overrides keyed by service id (`smb`, `nfs`, `ftp`, `nginx`).
    #[serde(default)]
    pub services: BTreeMap<String, ServiceOverride>,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path to the Unix socket file.
    #[serde(default = "default_socket_path")]
    pub path: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
}

/// Timeouts for external commands and post-reload verification.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Syntax-check subprocess timeout.
    #[serde(default = "default_validate_timeout")]
    pub validate_seconds: u64,
    /// Service manager call timeout.
    #[serde(default = "default_control_timeout")]
    pub control_seconds: u64,
    /// How long a reloaded service may take to report `running`.
    #[serde(default = "default_verify_grace")]
    pub verify_grace_seconds: u64,
    /// Status polling interval during verification.
    #[serde(default = "default_verify_poll")]
    pub verify_poll_millis: u64,
}

/// Snapshot history configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Directory holding one subdirectory of snapshots per service.
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
    /// Number of snapshots kept per service.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

/// Paths configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Optional directory whose `.tera` files override the built-in templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Reject shares whose source directory does not exist.
    #[serde(default = "default_true")]
    pub require_existing_share_paths: bool,
}

/// Orchestrator behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Skip validate/apply/reload when the rendered file equals the live file.
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

/// Overrides for one built-in service record.
///
/// Every field is optional; unset fields keep the built-in value.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceOverride {
    /// Disable the service entirely.
    pub enabled: Option<bool>,
    /// Live configuration file path.
    pub live_path: Option<PathBuf>,
    /// Systemd unit name.
    pub unit: Option<String>,
    /// Syntax-check argv; `{config}` is replaced by the candidate file path.
    pub check_command: Option<Vec<String>>,
    /// Reload argv; `{unit}` is replaced by the unit name.
    pub reload_command: Option<Vec<String>>,
    /// Whether to reload or restart after applying.
    pub reload_strategy: Option<ReloadStrategy>,
}

// Default value functions
fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/share-daemon/daemon.sock")
}

fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576 // 1MB
}

fn default_max_concurrent() -> usize {
    32
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_validate_timeout() -> u64 {
    10
}

fn default_control_timeout() -> u64 {
    15
}

fn default_verify_grace() -> u64 {
    5
}

fn default_verify_poll() -> u64 {
    250
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/var/lib/share-daemon/snapshots")
}

fn default_retention() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/share-daemon/audit.log")
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: default_socket_path(),
            permissions: default_socket_permissions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_concurrent_requests: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            validate_seconds: default_validate_timeout(),
            control_seconds: default_control_timeout(),
            verify_grace_seconds: default_verify_grace(),
            verify_poll_millis: default_verify_poll(),
        }
    }
}

impl TimeoutsConfig {
    pub fn validate(&self) -> Duration {
        Duration::from_secs(self.validate_seconds)
    }

    pub fn control(&self) -> Duration {
        Duration::from_secs(self.control_seconds)
    }

    pub fn verify_grace(&self) -> Duration {
        Duration::from_secs(self.verify_grace_seconds)
    }

    pub fn verify_poll(&self) -> Duration {
        Duration::from_millis(self.verify_poll_millis)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            retention: default_retention(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            require_existing_share_paths: true,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            skip_unchanged: true,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DaemonError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml_str(&content).map_err(|e| DaemonError::Config {
            message: format!("Config file '{}': {}", path.display(), e),
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, DaemonError> {
        let settings: Settings = toml::from_str(content).map_err(|e| DaemonError::Config {
            message: format!("Failed to parse configuration: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), DaemonError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if !self.socket.permissions.chars().all(|c| c.is_ascii_digit()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0660')",
                    self.socket.permissions
                ),
            });
        }

        if self.backup.retention == 0 {
            return Err(DaemonError::Config {
                message: "backup.retention must be at least 1".to_string(),
            });
        }

        if self.timeouts.validate_seconds == 0 || self.timeouts.control_seconds == 0 {
            return Err(DaemonError::Config {
                message: "timeouts.validate_seconds and timeouts.control_seconds must be positive"
                    .to_string(),
            });
        }

        for (id, service) in &self.services {
            let empty_argv = service.check_command.as_ref().is_some_and(|c| c.is_empty())
                || service.reload_command.as_ref().is_some_and(|c| c.is_empty());
            if empty_argv {
                return Err(DaemonError::Config {
                    message: format!("services.{}: command lists must not be empty", id),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_socket_permissions(), "0660");
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert_eq!(default_retention(), 5);
        assert_eq!(default_validate_timeout(), 10);
        assert_eq!(default_control_timeout(), 15);
    }

    #[test]
    fn test_parse_minimal_config() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.backup.retention, 5);
        assert!(settings.orchestrator.skip_unchanged);
        assert!(settings.services.is_empty());
    }

    #[test]
    fn test_parse_service_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            [backup]
            dir = "/tmp/snapshots"
            retention = 3

            [services.ftp]
            live_path = "/etc/vsftpd/vsftpd.conf"
            reload_strategy = "restart"

            [services.smb]
            check_command = ["testparm", "-s", "--suppress-prompt", "{config}"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.backup.retention, 3);
        let ftp = &settings.services["ftp"];
        assert_eq!(
            ftp.live_path.as_deref(),
            Some(Path::new("/etc/vsftpd/vsftpd.conf"))
        );
        assert_eq!(ftp.reload_strategy, Some(ReloadStrategy::Restart));
        assert_eq!(settings.services["smb"].check_command.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_rejects_zero_retention() {
        let result = Settings::from_toml_str("[backup]\nretention = 0\n");
        assert!(matches!(result, Err(DaemonError::Config { .. })));
    }

    #[test]
    fn test_rejects_invalid_log_level() {
        let result = Settings::from_toml_str("[logging]\nlevel = \"loud\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_command() {
        let result = Settings::from_toml_str("[services.nginx]\nreload_command = []\n");
        assert!(result.is_err());
    }
}
