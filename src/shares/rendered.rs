//! Rendered configuration values.

use chrono::{DateTime, Utc};
use ring::digest;
use serde::Serialize;

use super::spec::ShareSpec;

/// A complete configuration file produced for one service.
///
/// Immutable: every render produces a fresh value that supersedes the previous one.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedConfig {
    service: String,
    content: String,
    content_hash: String,
    generated_at: DateTime<Utc>,
    specs: Vec<ShareSpec>,
}

impl RenderedConfig {
    pub(crate) fn new(service: &str, content: String, specs: Vec<ShareSpec>) -> Self {
        Self {
            service: service.to_string(),
            content_hash: content_hash(&content),
            content,
            generated_at: Utc::now(),
            specs,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Hex SHA-256 of the content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// The enabled specs the content was rendered from, in output order.
    pub fn specs(&self) -> &[ShareSpec] {
        &self.specs
    }
}

/// Hex-encoded SHA-256 of a configuration text.
pub fn content_hash(content: &str) -> String {
    hex::encode(digest::digest(&digest::SHA256, content.as_bytes()).as_ref())
}
