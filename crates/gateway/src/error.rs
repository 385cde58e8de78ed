use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Gateway errors with appropriate HTTP status codes.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Provider not found in configuration.
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// The provider exists but does not implement the requested capability.
    #[error("Provider '{provider}' does not support {operation}")]
    UnsupportedOperation { provider: String, operation: &'static str },

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Prompt not found in the registry.
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Required template variables were missing.
    #[error("Missing required variables for {key}: {missing:?}")]
    PromptValidation { key: String, missing: Vec<String> },

    /// Template rendering or post-render parsing failed.
    #[error("Failed to render prompt {key}: {message}")]
    PromptRender { key: String, message: String },

    /// Authentication failed upstream (missing or invalid API key).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded upstream.
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// Insufficient quota or credits upstream.
    #[error("Insufficient quota: {0}")]
    InsufficientQuota(String),

    /// Model not found at the provider.
    #[error("{0}")]
    ModelNotFound(String),

    /// Provider API returned an error.
    #[error("Provider API error ({status}): {message}")]
    ProviderApiError { status: u16, message: String },

    /// Network or connection error.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Internal server error.
    /// If Some(message), it came from a provider and can be shown.
    /// If None, it is an internal error and should not leak details.
    #[error("Internal server error")]
    InternalError(Option<String>),
}

impl GatewayError {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::UnsupportedOperation { .. }
            | Self::PromptValidation { .. }
            | Self::PromptRender { .. } => StatusCode::BAD_REQUEST,
            Self::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientQuota(_) => StatusCode::FORBIDDEN,
            Self::ProviderNotFound(_) | Self::ModelNotFound(_) | Self::PromptNotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ConnectionError(_) => StatusCode::BAD_GATEWAY,
            Self::ProviderApiError { status, .. } => match *status {
                400 => StatusCode::BAD_REQUEST,
                401 => StatusCode::UNAUTHORIZED,
                403 => StatusCode::FORBIDDEN,
                404 => StatusCode::NOT_FOUND,
                429 => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response.
    pub fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_)
            | Self::UnsupportedOperation { .. }
            | Self::PromptValidation { .. }
            | Self::PromptRender { .. } => "invalid_request_error",
            Self::AuthenticationFailed(_) => "authentication_error",
            Self::InsufficientQuota(_) => "insufficient_quota",
            Self::ProviderNotFound(_) | Self::ModelNotFound(_) | Self::PromptNotFound(_) => "not_found_error",
            Self::RateLimitExceeded { .. } => "rate_limit_error",
            Self::ConnectionError(_) | Self::ProviderApiError { .. } => "api_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Message that is safe to expose to API consumers.
    pub fn client_message(&self) -> String {
        match self {
            Self::InternalError(Some(provider_msg)) => provider_msg.clone(),
            Self::InternalError(None) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Map an upstream HTTP status and body to a typed error, preserving the
    /// body so callers see what the backend reported.
    pub fn from_upstream(status: u16, body: String) -> Self {
        match status {
            400 => Self::InvalidRequest(body),
            401 => Self::AuthenticationFailed(body),
            403 => Self::InsufficientQuota(body),
            404 => Self::ModelNotFound(body),
            429 => Self::RateLimitExceeded { message: body },
            500 => Self::InternalError(Some(body)),
            _ => Self::ProviderApiError { status, message: body },
        }
    }
}

/// Error response format compatible with the OpenAI API.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.client_message();

        let error_response = ErrorResponse {
            error: ErrorDetails {
                message,
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_mapping() {
        let cases = [
            (400, StatusCode::BAD_REQUEST),
            (401, StatusCode::UNAUTHORIZED),
            (403, StatusCode::FORBIDDEN),
            (404, StatusCode::NOT_FOUND),
            (429, StatusCode::TOO_MANY_REQUESTS),
            (500, StatusCode::INTERNAL_SERVER_ERROR),
            (503, StatusCode::BAD_GATEWAY),
        ];

        for (upstream, expected) in cases {
            let error = GatewayError::from_upstream(upstream, "boom".to_string());
            assert_eq!(error.status_code(), expected, "upstream {upstream}");
        }
    }

    #[test]
    fn internal_error_without_message_does_not_leak() {
        assert_eq!(GatewayError::InternalError(None).client_message(), "Internal server error");
        assert_eq!(
            GatewayError::InternalError(Some("upstream said no".to_string())).client_message(),
            "upstream said no"
        );
    }
}
