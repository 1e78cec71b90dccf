//! Snapshot history of live configuration files.

mod snapshot;
mod store;

pub use snapshot::ConfigSnapshot;
pub use store::BackupStore;
