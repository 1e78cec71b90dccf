//! Snapshot history commands.

mod list;

pub use list::ListSnapshotsCommand;
