//! Configuration templates.
//!
//! Built-in Tera templates for every managed service, optionally overridden
//! from a directory, and the renderer that feeds them share specs.

mod engine;
mod renderer;

pub use engine::TemplateEngine;
pub use renderer::Renderer;
