//! Tera template engine wrapper.
//!
//! Provides template loading, rendering, and management.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::DaemonError;

/// Templates compiled into the binary, keyed by the names service records use.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("smb.conf.tera", include_str!("builtin/smb.conf.tera")),
    ("exports.tera", include_str!("builtin/exports.tera")),
    ("vsftpd.conf.tera", include_str!("builtin/vsftpd.conf.tera")),
    ("nginx.conf.tera", include_str!("builtin/nginx.conf.tera")),
];

/// Template engine for rendering configuration files.
///
/// Wraps Tera and provides a simplified interface for template operations.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create an engine holding only the built-in templates.
    pub fn builtin() -> Result<Self, DaemonError> {
        let mut tera = Tera::default();
        add_builtin(&mut tera)?;

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Create an engine where `.tera` files found under `override_dir` replace
    /// built-in templates of the same name.
    pub fn with_overrides(override_dir: &Path) -> Result<Self, DaemonError> {
        let pattern = override_dir.join("**/*.tera");
        let pattern_str = pattern.to_string_lossy();

        debug!(pattern = %pattern_str, "Loading template overrides");

        let mut tera = Tera::new(&pattern_str).map_err(|e| DaemonError::Template {
            message: format!(
                "Failed to load templates from '{}': {}",
                override_dir.display(),
                e
            ),
        })?;

        let overridden = tera.get_template_names().count();

        let mut builtin = Tera::default();
        add_builtin(&mut builtin)?;
        // Existing (override) templates win over the built-in ones.
        tera.extend(&builtin).map_err(|e| DaemonError::Template {
            message: format!("Failed to merge built-in templates: {}", e),
        })?;

        info!(
            directory = %override_dir.display(),
            overridden,
            count = tera.get_template_names().count(),
            "Template engine initialized"
        );

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Render a template with a serializable context.
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String, DaemonError> {
        let tera_context = Context::from_serialize(context).map_err(|e| DaemonError::Template {
            message: format!("Invalid template context: {}", e),
        })?;

        self.tera
            .render(template_name, &tera_context)
            .map_err(|e| DaemonError::Template {
                message: format!("Failed to render template '{}': {}", template_name, e),
            })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Get the number of loaded templates.
    pub fn template_count(&self) -> usize {
        self.tera.get_template_names().count()
    }
}

fn add_builtin(tera: &mut Tera) -> Result<(), DaemonError> {
    tera.add_raw_templates(BUILTIN_TEMPLATES.iter().copied())
        .map_err(|e| DaemonError::Template {
            message: format!("Failed to compile built-in templates: {}", e),
        })
}
