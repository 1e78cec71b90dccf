//! Request parameters, command outcomes and per-request context.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{DaemonError, ValidationErrorKind};

/// The `params` object of a request.
#[derive(Debug, Clone)]
pub struct CommandParams {
    inner: Value,
}

impl CommandParams {
    pub fn new(value: Value) -> Self {
        Self { inner: value }
    }

    /// Required string parameter.
    pub fn get_string(&self, key: &str) -> Result<String, DaemonError> {
        self.inner
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| missing(key))
    }

    /// Boolean flag; absent or non-boolean values read as `default`.
    pub fn get_optional_bool(&self, key: &str, default: bool) -> bool {
        self.inner
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Deserialize a required parameter into `T`.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<T, DaemonError> {
        let value = self.inner.get(key).ok_or_else(|| missing(key))?;
        typed(key, value)
    }

    /// Deserialize an optional parameter; absent or `null` gives `T::default()`.
    pub fn get_typed_or_default<T: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, DaemonError> {
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => typed(key, value),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }

    /// Validation helper: fails unless `key` holds a string.
    pub fn require_string(&self, key: &str) -> Result<(), DaemonError> {
        self.get_string(key).map(|_| ())
    }
}

fn missing(key: &str) -> DaemonError {
    DaemonError::Validation {
        kind: ValidationErrorKind::MissingParameter {
            param: key.to_string(),
        },
    }
}

fn typed<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, DaemonError> {
    T::deserialize(value).map_err(|e| DaemonError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: key.to_string(),
            message: e.to_string(),
        },
    })
}

/// What a command hands back to the connection.
///
/// Commands return `Err` for requests they could not carry out. A
/// `success: false` result is for work that ran to a reportable failure,
/// such as a configuration run that was rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Structured failure details, e.g. the full run report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
}

impl CommandResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_code: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            error_details: None,
        }
    }

    /// A failure that carries `details` to the client.
    pub fn failure_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            error_details: Some(details),
            ..Self::failure(code, message)
        }
    }
}

/// Metadata about the request being executed.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub request_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub command: String,
}

impl ExecutionContext {
    /// Context for a request received now.
    pub fn new(request_id: Uuid, command: impl Into<String>) -> Self {
        Self {
            request_id,
            received_at: Utc::now(),
            command: command.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::{GlobalOptions, ShareSpec};

    #[test]
    fn test_get_string() {
        let params = CommandParams::new(serde_json::json!({
            "service": "smb",
            "count": 42
        }));

        assert_eq!(params.get_string("service").unwrap(), "smb");
        assert!(params.get_string("count").is_err());
        assert!(params.require_string("missing").is_err());
        assert!(params.get_optional_bool("missing", true));
    }

    #[test]
    fn test_typed_params() {
        let params = CommandParams::new(serde_json::json!({
            "specs": [{"name": "docs", "path": "/srv/docs"}],
            "options": null,
            "bad": "not a list"
        }));

        let specs: Vec<ShareSpec> = params.get_typed("specs").unwrap();
        assert_eq!(specs[0].name, "docs");
        assert!(specs[0].enabled);

        let options: GlobalOptions = params.get_typed_or_default("options").unwrap();
        assert!(options.extra.is_empty());
        let absent: GlobalOptions = params.get_typed_or_default("nothing").unwrap();
        assert_eq!(absent, GlobalOptions::default());

        let bad: Result<Vec<ShareSpec>, _> = params.get_typed("bad");
        assert!(matches!(
            bad,
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::InvalidParameter { .. }
            })
        ));
        assert!(matches!(
            params.get_typed::<Vec<String>>("missing"),
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::MissingParameter { .. }
            })
        ));
    }

    #[test]
    fn test_failure_with_details() {
        let result = CommandResult::failure_with_details(
            "CONTROL_ERROR",
            "reload of smbd failed",
            serde_json::json!({"outcome": "rolled_back"}),
        );
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error_code.as_deref(), Some("CONTROL_ERROR"));
        assert_eq!(result.error_details.unwrap()["outcome"], "rolled_back");

        let encoded = serde_json::to_value(CommandResult::success(serde_json::json!({}))).unwrap();
        assert!(encoded.get("error_code").is_none());
    }
}
