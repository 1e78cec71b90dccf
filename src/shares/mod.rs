//! Share records and the configuration values rendered from them.

mod rendered;
mod spec;

pub use rendered::{content_hash, RenderedConfig};
pub use spec::{GlobalOptions, NfsFlags, ShareSpec};
