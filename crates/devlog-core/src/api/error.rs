use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Code reported when the server gave us nothing machine-readable.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Code reported for field-level validation failures without their own code.
pub const VALIDATION_CODE: &str = "VALIDATION_ERROR";

/// Error surfaced to callers of the API client. Every variant carries a
/// machine-readable code (see [`ApiError::code`]) and a display message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 401 that survived the refresh-and-retry cycle.
    #[error("{message}")]
    Unauthorized { code: String, message: String },

    #[error("Session expired - please log in again")]
    RefreshFailed,

    /// Structured validation failure; every field message is kept.
    #[error("{message}")]
    Validation {
        status: u16,
        code: String,
        message: String,
    },

    /// Any other structured error body.
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Error status with a body we could not make sense of.
    #[error("{message}")]
    Unknown { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Maximum length for error response bodies in log lines
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shapes the backend produces: `{code, message}` from its own
/// handlers, `{detail: [...]}` from request validation and `{detail: "..."}`
/// from plain HTTP exceptions.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    detail: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Fields(Vec<FieldError>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct FieldError {
    #[serde(default)]
    msg: String,
}

impl ApiError {
    /// Machine-readable code for display and matching.
    pub fn code(&self) -> &str {
        match self {
            ApiError::Unauthorized { code, .. }
            | ApiError::Validation { code, .. }
            | ApiError::Api { code, .. } => code,
            ApiError::RefreshFailed => "REFRESH_FAILED",
            ApiError::Unknown { .. } | ApiError::Network(_) => UNKNOWN_CODE,
            ApiError::InvalidResponse(_) => "INVALID_RESPONSE",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// HTTP status, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Validation { status, .. }
            | ApiError::Api { status, .. }
            | ApiError::Unknown { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the caller should treat the session as gone.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. } | ApiError::RefreshFailed)
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Fallback message when the body has none: the reason phrase.
    fn status_message(status: StatusCode) -> String {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
    }

    /// Build an error from a non-success response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!(status = %status, body = %Self::truncate_body(body), "Unparseable error body");
                let message = Self::status_message(status);
                return if status == StatusCode::UNAUTHORIZED {
                    ApiError::Unauthorized {
                        code: UNKNOWN_CODE.to_string(),
                        message,
                    }
                } else {
                    ApiError::Unknown {
                        status: status.as_u16(),
                        message,
                    }
                };
            }
        };

        let field_messages = match &parsed.detail {
            Some(ErrorDetail::Fields(fields)) => Some(
                fields
                    .iter()
                    .map(|f| f.msg.as_str())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        };

        let message = parsed
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| field_messages.clone().filter(|m| !m.is_empty()))
            .or_else(|| match &parsed.detail {
                Some(ErrorDetail::Text(text)) if !text.is_empty() => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_else(|| Self::status_message(status));

        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized {
                code: parsed.code.unwrap_or_else(|| UNKNOWN_CODE.to_string()),
                message,
            };
        }

        if field_messages.is_some() {
            return ApiError::Validation {
                status: status.as_u16(),
                code: parsed.code.unwrap_or_else(|| VALIDATION_CODE.to_string()),
                message,
            };
        }

        ApiError::Api {
            status: status.as_u16(),
            code: parsed.code.unwrap_or_else(|| UNKNOWN_CODE.to_string()),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_joined() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"email invalid","type":"value_error"},{"msg":"password too short"}]}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.to_string(), "email invalid; password too short");
        assert_eq!(err.code(), VALIDATION_CODE);
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn test_structured_error_keeps_code() {
        let body = r#"{"code":"POST_NOT_FOUND","message":"Post not found"}"#;
        let err = ApiError::from_status(StatusCode::NOT_FOUND, body);
        assert_eq!(
            err,
            ApiError::Api {
                status: 404,
                code: "POST_NOT_FOUND".to_string(),
                message: "Post not found".to_string(),
            }
        );
    }

    #[test]
    fn test_detail_string_becomes_message() {
        let err = ApiError::from_status(StatusCode::FORBIDDEN, r#"{"detail":"Admin only"}"#);
        assert_eq!(err.to_string(), "Admin only");
        assert_eq!(err.code(), UNKNOWN_CODE);
    }

    #[test]
    fn test_unparseable_body_is_unknown() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.code(), UNKNOWN_CODE);
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[test]
    fn test_unauthorized_keeps_server_code() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"code":"TOKEN_EXPIRED","message":"Access token expired"}"#,
        );
        assert!(err.is_auth_failure());
        assert_eq!(err.code(), "TOKEN_EXPIRED");
        assert_eq!(err.to_string(), "Access token expired");

        let bare = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(bare.code(), UNKNOWN_CODE);
        assert_eq!(bare.to_string(), "Unauthorized");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
