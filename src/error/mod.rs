//! Error types for the share daemon.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
