//! Web-specific error types and conversions

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metricgate_core::RejectionReason;
use serde_json::json;
use thiserror::Error;

/// Web-specific error type for HTTP API operations
#[derive(Debug, Error)]
pub enum WebError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    TooManyRequests { message: String },

    #[error("{message}")]
    ServiceUnavailable { code: &'static str, message: String },

    #[error("{message}")]
    Internal { message: String },
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            WebError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            WebError::NotFound { .. } => StatusCode::NOT_FOUND,
            WebError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            WebError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WebError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            WebError::BadRequest { code, .. } | WebError::ServiceUnavailable { code, .. } => *code,
            WebError::Unauthorized { .. } => "UNAUTHORIZED",
            WebError::NotFound { .. } => "NOT_FOUND",
            WebError::TooManyRequests { .. } => "OVERLOADED",
            WebError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<RejectionReason> for WebError {
    fn from(reason: RejectionReason) -> Self {
        let code = reason.code();
        let message = reason.to_string();
        match reason {
            RejectionReason::Unauthorized => WebError::Unauthorized { message },
            RejectionReason::Malformed(_) | RejectionReason::InvalidValue(_) => WebError::BadRequest { code, message },
            RejectionReason::Overloaded => WebError::TooManyRequests { message },
            RejectionReason::BufferFull => WebError::ServiceUnavailable { code, message },
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let WebError::Internal { message } = &self {
            tracing::error!("Internal error: {}", message);
        }

        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string()
            }
        });

        let mut response = (status, Json(body)).into_response();
        if matches!(self, WebError::TooManyRequests { .. } | WebError::ServiceUnavailable { .. }) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
