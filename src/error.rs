//! # Error Handling
//!
//! Crate error type and its mapping onto HTTP responses.
//!
//! ## Taxonomy (and status mapping):
//! - **ServiceUnavailable** (503): a dependency is intentionally or
//!   accidentally not configured (transcription disabled, no durable store)
//! - **ValidationError** (400): malformed request data
//! - **Internal** (500): unexpected failure inside an adapter
//! - **ConfigError** (500): configuration could not be loaded or validated
//!
//! Note what is deliberately absent: persistence failures during text
//! analysis never become an `AppError`: the handlers log them and return
//! the scoring result anyway (availability of the assessment flow is chosen
//! over durability).
//!
//! ## JSON error body:
//! ```json
//! {"error": {"type": "service_unavailable", "message": "...", "timestamp": "..."}}
//! ```

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// A required dependency is not configured or not loaded.
    ServiceUnavailable(String),

    /// The client sent data that fails validation.
    ValidationError(String),

    /// Unexpected server-side failure.
    Internal(String),

    /// Configuration file or environment problems.
    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::ServiceUnavailable(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::ConfigError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.error_response().status(), expected);
        }
    }

    #[test]
    fn test_display_includes_cause() {
        let error = AppError::ServiceUnavailable("transcription disabled".into());
        assert!(error.to_string().contains("transcription disabled"));
    }

    #[test]
    fn test_anyhow_conversion_is_internal() {
        let error: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(error, AppError::Internal(_)));
    }
}
