//! Command handlers module.
//!
//! Contains the command registry and all command implementations.
//!
//! ## Adding a New Command
//!
//! 1. Create a new file in the appropriate subdirectory (e.g., `shares/`, `service/`)
//! 2. Implement the `Command` trait
//! 3. Register the command in `CommandRegistry::new()`

mod backend;
mod registry;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub mod service;
pub mod shares;
pub mod snapshot;
pub mod system;

pub use backend::Backend;
pub use registry::CommandRegistry;
pub use traits::Command;
pub use types::{CommandParams, CommandResult, ExecutionContext};
