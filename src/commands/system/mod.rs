//! System commands module.
//!
//! Contains the ping command used for health checks.

mod ping;

pub use ping::PingCommand;
