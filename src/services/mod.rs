//! Service records, the service registry and the service controller.
//!
//! ## Adding a New Service
//!
//! 1. Create a new file in this directory returning a `ServiceProfile`
//! 2. Add a template for it under `src/templates/builtin/`
//! 3. Register the record in `ServiceRegistry::new()`

mod controller;
mod nfs;
mod nginx;
mod profile;
mod registry;
mod samba;
mod state;
mod vsftpd;

pub use controller::ServiceController;
pub use profile::{ConfigCheck, ReloadStrategy, ServiceProfile, ShareProtocol};
pub use registry::ServiceRegistry;
pub use state::{ServiceAction, ServiceState};

/// Built-in service records, for callers that assemble their own registry.
pub mod builtin {
    pub use super::nfs::profile as nfs;
    pub use super::nginx::profile as nginx;
    pub use super::samba::profile as samba;
    pub use super::vsftpd::profile as vsftpd;
}
