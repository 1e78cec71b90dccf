//! Unix socket server module.
//!
//! Accepts framed JSON requests and hands them to the command registry.

mod connection;
mod listener;

pub use connection::handle_connection;
pub use listener::{ActiveConnection, ConnectionMetrics, SocketListener};
