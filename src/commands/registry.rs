//! Command registry for dispatching requests to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CommandErrorKind, DaemonError};

use super::backend::Backend;
use super::service::{
    ControlServiceCommand, ListServicesCommand, RollbackServiceCommand, StatusServiceCommand,
};
use super::shares::{ApplySharesCommand, RenderSharesCommand};
use super::snapshot::ListSnapshotsCommand;
use super::system::PingCommand;
use super::traits::Command;
use super::types::{CommandParams, CommandResult, ExecutionContext};

/// Registry of all available commands.
#[derive(Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with every built-in command wired to `backend`.
    pub fn new(backend: Backend) -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };

        // System commands
        registry.register(Arc::new(PingCommand::new(backend.clone())));

        // Share configuration commands
        registry.register(Arc::new(ApplySharesCommand::new(backend.clone())));
        registry.register(Arc::new(RenderSharesCommand::new(backend.clone())));

        // Service commands
        registry.register(Arc::new(ListServicesCommand::new(backend.clone())));
        registry.register(Arc::new(StatusServiceCommand::new(backend.clone())));
        registry.register(Arc::new(ControlServiceCommand::new(backend.clone())));
        registry.register(Arc::new(RollbackServiceCommand::new(backend.clone())));

        // Snapshot commands
        registry.register(Arc::new(ListSnapshotsCommand::new(backend)));

        info!(
            count = registry.commands.len(),
            "Command registry initialized"
        );

        registry
    }

    /// Register a command.
    fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        debug!(command = name, "Registering command");
        self.commands.insert(name, command);
    }

    /// Get a command by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Dispatch a request to the appropriate command handler.
    ///
    /// Blocking: call from a blocking worker.
    pub fn dispatch(
        &self,
        ctx: &ExecutionContext,
        command_name: &str,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError> {
        let command = self
            .commands
            .get(command_name)
            .ok_or_else(|| DaemonError::Command {
                kind: CommandErrorKind::UnknownCommand {
                    name: command_name.to_string(),
                },
            })?;

        command.validate(&params)?;
        command.execute(ctx, params)
    }

    /// List all registered command names, sorted.
    pub fn list_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
