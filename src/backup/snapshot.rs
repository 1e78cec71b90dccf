//! Snapshot records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shares::content_hash;

/// A copy of one service's live file taken before it was replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Sequence number, increasing per service.
    pub id: u64,
    pub service: String,
    pub live_path: PathBuf,
    /// File content, or `None` when no live file existed.
    pub content: Option<String>,
    pub content_hash: Option<String>,
    pub taken_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    pub(crate) fn new(id: u64, service: &str, live_path: PathBuf, content: Option<String>) -> Self {
        Self {
            id,
            service: service.to_string(),
            live_path,
            content_hash: content.as_deref().map(content_hash),
            content,
            taken_at: Utc::now(),
        }
    }

    /// Whether the snapshot recorded that the live file did not exist.
    pub fn is_absent(&self) -> bool {
        self.content.is_none()
    }

    /// Whether the stored hash still matches the stored content.
    pub fn is_intact(&self) -> bool {
        self.content.as_deref().map(content_hash) == self.content_hash
    }
}
