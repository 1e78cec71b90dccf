//! Request types for the daemon protocol.

use serde::{Deserialize, Serialize};

/// A request from a client.
///
/// The socket is only reachable by the management plane running as root, so
/// requests carry no signature; file permissions on the socket are the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The command to execute (e.g., "shares.apply", "service.status").
    pub command: String,

    /// Command parameters as a JSON object.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::json!({})
}

impl Request {
    /// Create a request with no parameters.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: empty_params(),
        }
    }

    /// Add a parameter to the request (builder pattern).
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let Some(obj) = self.params.as_object_mut() {
            obj.insert(key.to_string(), value.into());
        }
        self
    }
}
