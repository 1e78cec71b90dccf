//! Command trait definition.

use crate::error::DaemonError;

use super::types::{CommandParams, CommandResult, ExecutionContext};

/// One request type the socket accepts, keyed by [`name`](Command::name).
///
/// `validate` runs first and must not touch the host; `execute` only runs
/// when it passes. Both are called on a blocking worker, so `execute` may
/// wait on the runtime through [`Backend::block_on`](super::Backend::block_on).
pub trait Command: Send + Sync {
    /// Dotted identifier, `<area>.<verb>`.
    fn name(&self) -> &'static str;

    /// Whether the command can change a live file or a unit's state.
    ///
    /// Mutating requests are logged at info, queries at debug.
    fn mutating(&self) -> bool {
        false
    }

    fn validate(&self, params: &CommandParams) -> Result<(), DaemonError>;

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, DaemonError>;
}
