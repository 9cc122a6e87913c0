//! Structured error types for Volt API calls and the shared form-error structure

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Errors that can occur while talking to the Volt API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Request rejected as invalid (400), optionally with per-field messages
    BadRequest {
        message: Option<String>,
        field_errors: Option<BTreeMap<String, String>>,
    },
    /// Token missing, expired or wrong credentials (401)
    Unauthorized(String),
    /// Resource not found (404)
    NotFound(String),
    /// Resource already exists (409)
    Conflict(String),
    /// Internal server failure (500)
    Server(String),
    /// Connectivity problem or any other status, 403 and 501-599 included
    Network(String),
    /// No bearer token stored in the session
    MissingCredential,
    /// Response body could not be decoded
    Decode(String),
}

/// Error bodies come back either as JSON objects or as plain text
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<BTreeMap<String, String>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest { message, .. } => match message {
                Some(msg) => write!(f, "Bad request: {}", msg),
                None => write!(f, "Bad request"),
            },
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Server(msg) => write!(f, "Server error: {}", msg),
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::MissingCredential => write!(f, "Authentication required. Please log in again."),
            ApiError::Decode(msg) => write!(f, "Unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Create an ApiError from a response status and its raw body
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let text = parsed
            .error
            .clone()
            .or_else(|| parsed.message.clone())
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            400 => ApiError::BadRequest {
                message: parsed.message.or(parsed.error).or_else(|| {
                    let trimmed = body.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_string())
                }),
                field_errors: parsed.errors,
            },
            401 => ApiError::Unauthorized(text),
            404 => ApiError::NotFound(text),
            409 => ApiError::Conflict(text),
            500 => ApiError::Server(text),
            _ => ApiError::Network(format!("unexpected status {}: {}", status, text)),
        }
    }

    /// Message suitable for a per-file error entry
    pub fn upload_message(&self) -> String {
        match self {
            ApiError::BadRequest { message: Some(msg), .. } => msg.clone(),
            ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Server(msg)
                if !msg.is_empty() =>
            {
                msg.clone()
            }
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Result type for API operations
pub type ApiResult<T = ()> = Result<T, ApiError>;

/// Key used for messages that do not belong to a single field
pub const GENERAL: &str = "general";

/// Mapping from field name (or [`GENERAL`]) to a user facing message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn new() -> Self {
        FormErrors::default()
    }

    pub fn general(message: impl Into<String>) -> Self {
        let mut errors = FormErrors::new();
        errors.set(GENERAL, message);
        errors
    }

    /// Translate an API failure into the messages shown to the user.
    /// Replaces the whole mapping, like every other write to it.
    pub fn from_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::BadRequest { message, field_errors } => match field_errors {
                Some(fields) if !fields.is_empty() => FormErrors(fields.clone()),
                _ => FormErrors::general(
                    message
                        .clone()
                        .unwrap_or_else(|| "Please check your input and try again.".to_string()),
                ),
            },
            ApiError::Unauthorized(_) => {
                FormErrors::general("Invalid email or password. Please try again.")
            }
            ApiError::Conflict(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("email") {
                    let mut errors = FormErrors::new();
                    errors.set("email", "An account with this email already exists.");
                    errors
                } else if lower.contains("username") {
                    let mut errors = FormErrors::new();
                    errors.set("username", "This username is already taken.");
                    errors
                } else {
                    FormErrors::general("An account with this email or username already exists.")
                }
            }
            ApiError::Server(_) => FormErrors::general("Server error. Please try again later."),
            ApiError::MissingCredential => {
                FormErrors::general("Authentication required. Please log in again.")
            }
            ApiError::Decode(_) => FormErrors::general("Unexpected response from server."),
            ApiError::NotFound(_) | ApiError::Network(_) => FormErrors::general(
                "Network error. Please check your connection and try again.",
            ),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn general_message(&self) -> Option<&str> {
        self.get(GENERAL)
    }

    /// Field specific entries, without the general message
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != GENERAL)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_plain_text_body() {
        let err = ApiError::from_status(401, "Invalid credentials\n");
        assert_eq!(err, ApiError::Unauthorized("Invalid credentials".into()));
    }

    #[test]
    fn test_from_status_json_error_body() {
        let err = ApiError::from_status(404, r#"{"error":"File not found"}"#);
        assert_eq!(err, ApiError::NotFound("File not found".into()));
    }

    #[test]
    fn test_from_status_bad_request_with_field_errors() {
        let err = ApiError::from_status(400, r#"{"errors":{"email":"Email is required"}}"#);
        let errors = FormErrors::from_api_error(&err);
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.general_message(), None);
    }

    #[test]
    fn test_bad_request_without_message_uses_default() {
        let err = ApiError::from_status(400, "");
        let errors = FormErrors::from_api_error(&err);
        assert_eq!(
            errors.general_message(),
            Some("Please check your input and try again.")
        );
    }

    #[test]
    fn test_from_status_server_error() {
        let err = ApiError::from_status(500, r#"{"error":"database unavailable"}"#);
        assert_eq!(err, ApiError::Server("database unavailable".into()));
        let errors = FormErrors::from_api_error(&err);
        assert_eq!(errors.general_message(), Some("Server error. Please try again later."));
    }

    #[test]
    fn test_forbidden_and_gateway_errors_use_network_message() {
        for status in [403, 501, 502, 503, 599] {
            let err = ApiError::from_status(status, "nope");
            assert!(matches!(err, ApiError::Network(_)), "status {}", status);
            let errors = FormErrors::from_api_error(&err);
            assert_eq!(
                errors.general_message(),
                Some("Network error. Please check your connection and try again."),
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_unexpected_status_is_network_error() {
        let err = ApiError::from_status(418, "teapot");
        assert!(matches!(err, ApiError::Network(_)));
        let errors = FormErrors::from_api_error(&err);
        assert_eq!(
            errors.general_message(),
            Some("Network error. Please check your connection and try again.")
        );
    }

    #[test]
    fn test_conflict_maps_to_field() {
        let err = ApiError::from_status(409, "User with this username already exists");
        let errors = FormErrors::from_api_error(&err);
        assert_eq!(errors.get("username"), Some("This username is already taken."));

        let err = ApiError::from_status(409, "User with this email already exists");
        let errors = FormErrors::from_api_error(&err);
        assert_eq!(errors.get("email"), Some("An account with this email already exists."));
    }

    #[test]
    fn test_fields_skips_general() {
        let mut errors = FormErrors::general("boom");
        errors.set("a.txt", "too big");
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec![("a.txt", "too big")]);
    }

    #[test]
    fn test_upload_message_prefers_server_text() {
        let err = ApiError::from_status(400, r#"{"error":"file too large"}"#);
        assert_eq!(err.upload_message(), "file too large");
        assert_eq!(
            ApiError::MissingCredential.upload_message(),
            "Authentication required. Please log in again."
        );
    }

    #[test]
    fn test_display() {
        let err = ApiError::NotFound("/api/v1/files/42".into());
        assert_eq!(format!("{}", err), "Not found: /api/v1/files/42");
    }
}
