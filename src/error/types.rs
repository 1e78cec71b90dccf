//! Error types for the share daemon.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Input validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Subprocess execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Template-related errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// Service configuration lifecycle errors.
    #[error("{kind}")]
    Service { kind: ServiceErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A worker died before producing a result.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Validation error kinds for individual input fields.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Path not allowed: {path}")]
    PathNotAllowed { path: PathBuf },

    #[error("Path traversal detected in: {path}")]
    PathTraversal { path: PathBuf },

    #[error("Invalid share name: {name}")]
    InvalidShareName { name: String },

    #[error("Invalid user name: {username}")]
    InvalidUsername { username: String },

    #[error("Invalid network: {network}")]
    InvalidNetwork { network: String },

    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Subprocess error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

/// Failures of the render/validate/backup/apply/reload pipeline.
#[derive(Error, Debug)]
pub enum ServiceErrorKind {
    #[error("Invalid share '{share}': {reason}")]
    InvalidSpec { share: String, reason: String },

    #[error("Configuration rejected by syntax check:\n{details}")]
    SyntaxError { details: String },

    #[error("Configuration check timed out after {timeout_secs} seconds")]
    ValidationTimeout { timeout_secs: u64 },

    #[error("Failed to snapshot {path}: {message}")]
    BackupFailure { path: PathBuf, message: String },

    #[error("Failed to replace {path}: {message}")]
    ApplyFailure { path: PathBuf, message: String },

    #[error("{action} of {unit} failed: {message}")]
    ControlError {
        unit: String,
        action: String,
        message: String,
    },

    #[error("{action} of {unit} timed out after {timeout_secs} seconds")]
    ControlTimeout {
        unit: String,
        action: String,
        timeout_secs: u64,
    },

    #[error("{unit} does not support reload")]
    ReloadUnsupported { unit: String },

    #[error("No snapshot available for service '{service}'")]
    NoSnapshotAvailable { service: String },

    #[error("Live configuration of '{service}' is in an unknown state: {message}")]
    InconsistentState { service: String, message: String },

    #[error("Service not recognized: {service}")]
    UnknownService { service: String },

    #[error("Operation cancelled before {stage}")]
    Cancelled { stage: String },
}

impl DaemonError {
    /// Shorthand for a service-level error.
    pub fn service(kind: ServiceErrorKind) -> Self {
        DaemonError::Service { kind }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::Config { .. } => "CONFIG_ERROR",
            DaemonError::Socket { .. } => "SOCKET_ERROR",
            DaemonError::Validation { .. } => "VALIDATION_ERROR",
            DaemonError::Command {
                kind: CommandErrorKind::UnknownCommand { .. },
            } => "UNKNOWN_COMMAND",
            DaemonError::Command {
                kind: CommandErrorKind::Timeout { .. },
            } => "COMMAND_TIMEOUT",
            DaemonError::Command { .. } => "COMMAND_ERROR",
            DaemonError::Template { .. } => "TEMPLATE_ERROR",
            DaemonError::Protocol { .. } => "PROTOCOL_ERROR",
            DaemonError::Service { kind } => kind.code(),
            DaemonError::Io(_) => "IO_ERROR",
            DaemonError::Serialization(_) => "SERIALIZATION_ERROR",
            DaemonError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this error means the live configuration can no longer be trusted.
    pub fn is_inconsistent(&self) -> bool {
        matches!(
            self,
            DaemonError::Service {
                kind: ServiceErrorKind::InconsistentState { .. }
            }
        )
    }
}

impl ServiceErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceErrorKind::InvalidSpec { .. } => "INVALID_SPEC",
            ServiceErrorKind::SyntaxError { .. } => "SYNTAX_ERROR",
            ServiceErrorKind::ValidationTimeout { .. } => "VALIDATION_TIMEOUT",
            ServiceErrorKind::BackupFailure { .. } => "BACKUP_FAILURE",
            ServiceErrorKind::ApplyFailure { .. } => "APPLY_FAILURE",
            ServiceErrorKind::ControlError { .. } => "CONTROL_ERROR",
            ServiceErrorKind::ControlTimeout { .. } => "CONTROL_TIMEOUT",
            ServiceErrorKind::ReloadUnsupported { .. } => "RELOAD_UNSUPPORTED",
            ServiceErrorKind::NoSnapshotAvailable { .. } => "NO_SNAPSHOT_AVAILABLE",
            ServiceErrorKind::InconsistentState { .. } => "INCONSISTENT_STATE",
            ServiceErrorKind::UnknownService { .. } => "UNKNOWN_SERVICE",
            ServiceErrorKind::Cancelled { .. } => "CANCELLED",
        }
    }
}
