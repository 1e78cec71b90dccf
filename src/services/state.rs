//! Service state and control actions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime state of a service as reported by the service manager.
///
/// Always queried on demand; the service manager is the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Unknown,
    Stopped,
    Starting,
    Running,
    Failed,
}

impl ServiceState {
    /// Interpret the first line printed by `systemctl is-active`.
    pub fn from_is_active(output: &str) -> Self {
        match output.lines().next().map(str::trim).unwrap_or("") {
            "active" | "reloading" => ServiceState::Running,
            "activating" => ServiceState::Starting,
            "inactive" | "deactivating" => ServiceState::Stopped,
            "failed" => ServiceState::Failed,
            _ => ServiceState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Unknown => "unknown",
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Failed => "failed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service manager action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
    Status,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Reload => "reload",
            ServiceAction::Status => "status",
        }
    }

    /// Parse an action name as sent by clients.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(ServiceAction::Start),
            "stop" => Some(ServiceAction::Stop),
            "restart" => Some(ServiceAction::Restart),
            "reload" => Some(ServiceAction::Reload),
            "status" => Some(ServiceAction::Status),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_is_active() {
        assert_eq!(ServiceState::from_is_active("active\n"), ServiceState::Running);
        assert_eq!(ServiceState::from_is_active("reloading"), ServiceState::Running);
        assert_eq!(ServiceState::from_is_active("activating\n"), ServiceState::Starting);
        assert_eq!(ServiceState::from_is_active("inactive\n"), ServiceState::Stopped);
        assert_eq!(ServiceState::from_is_active("failed\n"), ServiceState::Failed);
        assert_eq!(ServiceState::from_is_active(""), ServiceState::Unknown);
        assert_eq!(ServiceState::from_is_active("maintenance"), ServiceState::Unknown);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(ServiceAction::parse("reload"), Some(ServiceAction::Reload));
        assert_eq!(ServiceAction::parse("enable"), None);
        assert_eq!(ServiceAction::Restart.to_string(), "restart");
    }
}
