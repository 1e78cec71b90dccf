//! Audit logging module.
//!
//! Every configuration run, rollback and manual service action is appended
//! to the audit log as one JSON object per line, independent of the
//! operational `tracing` output.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditResult};
pub use logger::AuditLogger;
