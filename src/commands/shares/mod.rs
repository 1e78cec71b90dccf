//! Share configuration commands.

mod apply;
mod render;

pub use apply::ApplySharesCommand;
pub use render::RenderSharesCommand;
