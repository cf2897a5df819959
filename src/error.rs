use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Catalog store could not be reached or returned nothing usable
    #[error("Configuration unavailable: {0}")]
    ConfigUnavailable(String),
    /// Catalog or application configuration is inconsistent
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Malformed request payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// No stored quote with this number
    #[error("Quote not found: {0}")]
    QuoteNotFound(String),
    /// Quote exists but has no open editing session
    #[error("No open session for quote: {0}")]
    SessionNotOpen(String),
    /// Quote store failure
    #[error("Storage error: {0}")]
    Storage(String),
    /// Internal server error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConfigError(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::QuoteNotFound(_) | Self::SessionNotOpen(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::ConfigUnavailable(_) => "config_unavailable",
        AppError::ConfigError(_) => "config_error",
        AppError::InvalidInput(_) => "invalid_input",
        AppError::QuoteNotFound(_) => "quote_not_found",
        AppError::SessionNotOpen(_) => "session_not_open",
        AppError::Storage(_) => "storage_error",
        AppError::InternalError(_) => "internal_error",
    }
}

// Implement conversions from common error types
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::QuoteNotFound("2024-117".to_string());
        assert_eq!(error.to_string(), "Quote not found: 2024-117");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(
            error_type_name(&AppError::ConfigUnavailable("test".to_string())),
            "config_unavailable"
        );
        assert_eq!(
            error_type_name(&AppError::SessionNotOpen("test".to_string())),
            "session_not_open"
        );
    }

    #[tokio::test]
    async fn test_error_response() {
        let error = AppError::ConfigUnavailable("catalog.toml missing".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::InvalidInput("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
