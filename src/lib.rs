//! Share Daemon Library
//!
//! Renders Samba, NFS, FTP and Nginx configuration from declarative share
//! records, checks it with each service's own tooling, swaps it in
//! atomically and rolls back when the service does not come back healthy.

pub mod audit;
pub mod backup;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod files;
pub mod orchestrator;
pub mod protocol;
pub mod services;
pub mod shares;
pub mod socket;
pub mod templates;
pub mod validation;
pub mod validator;
