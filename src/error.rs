//! Gateway error taxonomy and its HTTP mapping.
//!
//! Every component failure is a typed variant here; the dispatcher never
//! builds error responses by hand. Bodies are always `{"detail": "..."}`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Why a protected request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingToken,
    #[error("Invalid token")]
    Invalid,
    #[error("Token expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Service '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("Rate limit exceeded")]
    TooManyRequests { retry_after_secs: u64 },

    /// Backend unreachable or retries exhausted. The cause is for logs only.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Invalid request body")]
    BadRequest,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BadRequest => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Server-side failures get a generic phrase.
    pub fn detail(&self) -> String {
        match self {
            GatewayError::BadGateway(_) => "Bad gateway".to_string(),
            GatewayError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Build a `{"detail": ...}` response.
pub fn detail_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = detail_response(self.status_code(), &self.detail());

        match &self {
            GatewayError::Unauthorized(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            GatewayError::TooManyRequests { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            _ => {}
        }

        response
    }
}
