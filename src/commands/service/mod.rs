//! Service management commands.
//!
//! - `service.list` - Registered services and their records
//! - `service.status` - Current state from the service manager
//! - `service.control` - Start, stop, restart or reload a service
//! - `service.rollback` - Restore the latest snapshot and reload

mod control;
mod list;
mod rollback;
mod status;

pub use control::ControlServiceCommand;
pub use list::ListServicesCommand;
pub use rollback::RollbackServiceCommand;
pub use status::StatusServiceCommand;
