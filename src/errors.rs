#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Too many lookups requested. Max {0} unique targets per request.")]
    TooManyTargets(usize),

    #[error("Bootstrap registry unavailable: {0}")]
    Bootstrap(String),

    #[error("Unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),

    #[error("Network timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] tokio::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<tokio::time::error::Elapsed> for LookupError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LookupError::Timeout
    }
}

impl LookupError {
    /// Short label used for error metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::InvalidRequest(_) => "invalid_request",
            LookupError::TooManyTargets(_) => "too_many_targets",
            LookupError::Bootstrap(_) => "bootstrap",
            LookupError::UnsupportedEndpoint(_) => "unsupported_endpoint",
            LookupError::Timeout => "timeout",
            LookupError::IoError(_) => "io_error",
            LookupError::HttpError(_) => "http_error",
            LookupError::JsonError(_) => "json_error",
            LookupError::ResponseTooLarge => "response_too_large",
            LookupError::ConfigError(_) => "config_error",
            LookupError::CacheError(_) => "cache_error",
            LookupError::Internal(_) => "other",
        }
    }
}

#[cfg(feature = "server")]
impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            LookupError::InvalidRequest(_) | LookupError::TooManyTargets(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            LookupError::Timeout => (StatusCode::REQUEST_TIMEOUT, self.to_string()),
            LookupError::Bootstrap(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_targets_message() {
        let err = LookupError::TooManyTargets(10);
        assert_eq!(
            err.to_string(),
            "Too many lookups requested. Max 10 unique targets per request."
        );
        assert_eq!(err.kind(), "too_many_targets");
    }
}
