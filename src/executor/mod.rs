//! Command executor module.
//!
//! Handles safe subprocess spawning, execution timeouts and output cleanup.

mod output;
mod subprocess;

pub use output::{find_marker, sanitize_output};
pub use subprocess::{CommandRunner, SubprocessResult, SystemRunner};
