//! Error types for backend API calls.
//!
//! Errors are categorized so callers can tell a dead server from a rejected
//! payload and give the user matching advice.

use serde_json::Value;
use std::fmt;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection refused, DNS, timeouts, 5xx (transient, retryable).
    Network,
    /// Missing or wrong API key.
    Auth,
    /// The backend rejected the payload.
    Validation,
    /// Resource or endpoint does not exist.
    NotFound,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Server unreachable",
            Self::Auth => "Authentication failed",
            Self::Validation => "Rejected by server",
            Self::NotFound => "Not found",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check base_url and that the server is running",
            Self::Auth => "Check api_key (Settings > General in the web UI)",
            Self::Validation => "Check the offending resource's fields against the server's schema",
            Self::NotFound => "Check the dialect matches the server (API v1 vs v3)",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure, no usable response.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The backend answered with an error status.
    #[error("HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
        /// Response body as returned, for diagnostics.
        payload: Value,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Unrecognised dialect name.
    #[error("unknown dialect '{0}' (expected sonarr, radarr, lidarr, readarr or whisparr)")]
    UnknownDialect(String),

    /// Resource kind the dialect has no endpoint for.
    #[error("{dialect} has no {kind} endpoint")]
    Unsupported {
        /// Dialect name.
        dialect: String,
        /// Resource kind label.
        kind: String,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP transport error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create an API error from a status and response body.
    #[must_use]
    pub fn api(status: u16, payload: Value) -> Self {
        Self::Api {
            status,
            message: api_message(status, &payload),
            payload,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { .. } => ErrorCategory::Network,
            Error::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                400 | 409 | 422 => ErrorCategory::Validation,
                500.. => ErrorCategory::Network,
                _ => ErrorCategory::Other,
            },
            Error::Unsupported { .. } => ErrorCategory::NotFound,
            Error::InvalidResponse(_) | Error::UnknownDialect(_) | Error::Other(_) => {
                ErrorCategory::Other
            }
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Diagnostic body the backend returned, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Error::Api { payload, .. } if !payload.is_null() => Some(payload),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body
///
/// Validation failures come back as `[{propertyName, errorMessage}]`,
/// other errors as `{message, description}` or plain text.
fn api_message(status: u16, payload: &Value) -> String {
    match payload {
        Value::Array(failures) => {
            let messages: Vec<String> = failures
                .iter()
                .filter_map(|f| {
                    let message = f.get("errorMessage")?.as_str()?;
                    Some(match f.get("propertyName").and_then(Value::as_str) {
                        Some(property) if !property.is_empty() => format!("{property}: {message}"),
                        _ => message.to_string(),
                    })
                })
                .collect();
            if messages.is_empty() {
                format!("status {status}")
            } else {
                messages.join("; ")
            }
        }
        Value::Object(body) => {
            let message = body.get("message").and_then(Value::as_str);
            let description = body.get("description").and_then(Value::as_str);
            match (message, description) {
                (Some(m), Some(d)) if !d.is_empty() && d != m => format!("{m} ({d})"),
                (Some(m), _) => m.to_string(),
                (None, Some(d)) => d.to_string(),
                (None, None) => format!("status {status}"),
            }
        }
        Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => format!("status {status}"),
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                message: format!("status {code}"),
                payload: Value::Null,
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_error_category_display() {
        let display = format!("{}", ErrorCategory::Auth);
        assert!(display.contains("Authentication"));
        assert!(!ErrorCategory::NotFound.advice().is_empty());
    }

    #[test]
    fn test_api_status_categories() {
        assert_eq!(Error::api(401, Value::Null).category(), ErrorCategory::Auth);
        assert_eq!(Error::api(404, Value::Null).category(), ErrorCategory::NotFound);
        assert_eq!(Error::api(400, Value::Null).category(), ErrorCategory::Validation);
        assert_eq!(Error::api(503, Value::Null).category(), ErrorCategory::Network);
        assert!(Error::api(502, Value::Null).is_retryable());
        assert_eq!(Error::api(418, Value::Null).category(), ErrorCategory::Other);
    }

    #[test]
    fn test_validation_array_message() {
        let err = Error::api(
            400,
            json!([
                {"propertyName": "Host", "errorMessage": "'Host' must not be empty."},
                {"propertyName": "", "errorMessage": "Unable to connect"}
            ]),
        );
        assert_eq!(
            err.to_string(),
            "HTTP 400: Host: 'Host' must not be empty.; Unable to connect"
        );
        assert!(err.payload().is_some());
    }

    #[test]
    fn test_object_message() {
        let err = Error::api(
            400,
            json!({"message": "Profile [HD] is in use", "description": ""}),
        );
        assert_eq!(err.to_string(), "HTTP 400: Profile [HD] is in use");

        let err = Error::api(500, json!({"message": "boom", "description": "stack"}));
        assert_eq!(err.to_string(), "HTTP 500: boom (stack)");
    }

    #[test]
    fn test_plain_and_empty_messages() {
        assert_eq!(Error::api(400, json!(" nope ")).to_string(), "HTTP 400: nope");
        let err = Error::api(500, Value::Null);
        assert_eq!(err.to_string(), "HTTP 500: status 500");
        assert!(err.payload().is_none());
    }

    #[test]
    fn test_unsupported_display() {
        let err = Error::Unsupported {
            dialect: "sonarr".into(),
            kind: "metadata profile".into(),
        };
        assert_eq!(err.to_string(), "sonarr has no metadata profile endpoint");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_serde_error() {
        let err: Error = serde_json::from_str::<Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
