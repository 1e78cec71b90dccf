//! Durable file replacement.

mod atomic;

pub use atomic::{atomic_write, remove_durably, AtomicWriter, ConfigWriter};
