//! Error types for Feed Relay.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the upstream mail and chat providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Any failure talking to Gmail. Carries the original error text only.
    #[error("Gmail API error: {0}")]
    Mail(String),

    /// Non-2xx answer from GroupMe.
    #[error("GroupMe API error ({status}): {body}")]
    Chat { status: u16, body: String },

    /// Transport or decoding failure before a status was available.
    #[error("HTTP error: {0}")]
    Http(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Errors surfaced by the HTTP facade. Each variant maps to one status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("Upstream request failed")]
    Redacted,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Provider(_) | Self::Llm(_) | Self::Redacted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Replace upstream error text with a generic message when `redact` is set.
    pub fn redacted(self, redact: bool) -> Self {
        match self {
            Self::Provider(_) | Self::Llm(_) if redact => {
                tracing::error!(error = %self, "Upstream request failed (redacted in response)");
                Self::Redacted
            }
            other => other,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ProviderError::Mail("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn provider_error_keeps_upstream_text() {
        let err = ApiError::from(ProviderError::Chat {
            status: 404,
            body: "group not found".into(),
        });
        assert!(err.to_string().contains("group not found"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn redaction_hides_upstream_text_only() {
        let err = ApiError::from(ProviderError::Mail("secret detail".into())).redacted(true);
        assert!(matches!(err, ApiError::Redacted));
        assert!(!err.to_string().contains("secret"));

        let auth = ApiError::Unauthorized("Missing authorization header".into()).redacted(true);
        assert!(matches!(auth, ApiError::Unauthorized(_)));

        let kept = ApiError::from(ProviderError::Mail("detail".into())).redacted(false);
        assert!(matches!(kept, ApiError::Provider(_)));
    }
}
