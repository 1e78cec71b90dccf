//! Responses sent back over the socket.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Codes whose messages may carry host detail (paths, OS errors).
/// Every other code is a domain error whose message is the diagnostic.
const INTERNAL_CODES: &[&str] = &["IO_ERROR", "SERIALIZATION_ERROR", "INTERNAL_ERROR"];

const INTERNAL_MESSAGE: &str = "Internal server error";

/// One response per request, correlated by `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub request_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Failure body: a stable machine code, the diagnostic, and optional
/// structured details such as a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Response {
    /// Success with a fresh request id.
    pub fn success(data: serde_json::Value) -> Self {
        Self::success_with_id(Uuid::new_v4(), data)
    }

    /// Error with a fresh request id.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::error_with_id(Uuid::new_v4(), code, message)
    }

    pub fn success_with_id(request_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            success: true,
            request_id,
            data: Some(data),
            error: None,
        }
    }

    /// Error response for `request_id`.
    ///
    /// Messages of internal codes are replaced with a generic one; the
    /// original is only logged.
    pub fn error_with_id(
        request_id: Uuid,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        let mut message = message.into();

        if INTERNAL_CODES.contains(&code.as_str()) {
            debug!(request_id = %request_id, code = %code, message = %message, "Hiding internal error detail");
            message = INTERNAL_MESSAGE.to_string();
        }

        Self {
            success: false,
            request_id,
            data: None,
            error: Some(ErrorResponse {
                code,
                message,
                details: None,
            }),
        }
    }

    /// Attach details to an error response. No-op on success responses.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_message_passes_through() {
        let response = Response::error_with_id(
            Uuid::new_v4(),
            "SYNTAX_ERROR",
            "line 2: export path 'srv' is not absolute",
        )
        .with_details(serde_json::json!({"stage": "validate"}));

        assert!(!response.success);
        let error = response.error.unwrap();
        assert_eq!(error.code, "SYNTAX_ERROR");
        assert!(error.message.contains("not absolute"));
        assert_eq!(error.details.unwrap()["stage"], "validate");
    }

    #[test]
    fn test_internal_message_hidden() {
        let response = Response::error("IO_ERROR", "open /var/lib/share-daemon/x: EACCES");
        assert_eq!(response.error.unwrap().message, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_details_ignored_on_success() {
        let response = Response::success(serde_json::json!({"state": "running"}))
            .with_details(serde_json::json!({"x": 1}));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(Response::success(serde_json::json!({"count": 4}))).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["request_id"].is_string());
        assert!(json.get("error").is_none());

        let parsed: Response = serde_json::from_str(&format!(
            r#"{{"success":false,"request_id":"{}","error":{{"code":"CANCELLED","message":"x"}}}}"#,
            Uuid::nil()
        ))
        .unwrap();
        assert!(parsed.data.is_none());
        assert_eq!(parsed.error.unwrap().code, "CANCELLED");
    }
}
