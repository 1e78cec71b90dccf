//! Orchestration of configuration runs.
//!
//! One run takes a service from declared shares to a validated, applied and
//! running configuration, rolling back when a step after the live file was
//! touched fails.

mod locks;
mod result;
mod run;

pub use locks::LockTable;
pub use result::{OperationResult, Outcome, RollbackReport, Stage};
pub use run::{ApplyRequest, Orchestrator, OrchestratorBuilder};
