//! Gateway error types and the JSON error body returned to submitters.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tl_02_ingestion::{ErrorCode, IngestError, ValidationFailure};

/// `{"err": <code>, "description"?: <text>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub err: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ErrorResponse {
    pub fn new(err: ErrorCode) -> Self {
        Self {
            err,
            description: None,
        }
    }

    pub fn with_description(err: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            err,
            description: Some(description.into()),
        }
    }
}

impl From<&ValidationFailure> for ErrorResponse {
    fn from(failure: &ValidationFailure) -> Self {
        Self {
            err: failure.error_code(),
            description: failure.description(),
        }
    }
}

/// A rejected submission, rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 415: wrong `Content-Type`
    UnsupportedMediaType,
    /// 406: client does not accept JSON
    NotAcceptable,
    /// 401: missing or unknown API key
    AuthenticationFailed,
    /// 403: authenticated client has no registration
    AccessDenied,
    /// 400 with a code and optional description
    BadRequest(ErrorResponse),
    /// 429 with `Retry-After`
    TooManyRequests { retry_after_secs: u64 },
    /// 503 with `Retry-After`: pipeline shutting down
    Unavailable { retry_after_secs: u64 },
    /// 500
    Internal,
}

impl Rejection {
    /// Map a pipeline error onto a response.
    pub fn from_ingest(error: &IngestError, retry_after_secs: u64) -> Self {
        match error {
            IngestError::Validation(failure) => Rejection::BadRequest(failure.into()),
            IngestError::Overloaded { .. } => Rejection::TooManyRequests { retry_after_secs },
            IngestError::Cancelled | IngestError::Closed => {
                Rejection::Unavailable { retry_after_secs }
            }
            IngestError::Storage(_) | IngestError::Config(_) => Rejection::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Rejection::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Rejection::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Rejection::AccessDenied => StatusCode::FORBIDDEN,
            Rejection::BadRequest(_) => StatusCode::BAD_REQUEST,
            Rejection::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Rejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Rejection::UnsupportedMediaType | Rejection::NotAcceptable | Rejection::Internal => {
                status.into_response()
            }
            Rejection::AuthenticationFailed => {
                (status, Json(ErrorResponse::new(ErrorCode::AuthenticationFailed))).into_response()
            }
            Rejection::AccessDenied => {
                (status, Json(ErrorResponse::new(ErrorCode::AccessDenied))).into_response()
            }
            Rejection::BadRequest(body) => (status, Json(body)).into_response(),
            Rejection::TooManyRequests { retry_after_secs } => with_retry_after(
                (status, Json(ErrorResponse::new(ErrorCode::TooManyRequest))).into_response(),
                retry_after_secs,
            ),
            Rejection::Unavailable { retry_after_secs } => {
                with_retry_after(status.into_response(), retry_after_secs)
            }
        }
    }
}

fn with_retry_after(mut response: Response, secs: u64) -> Response {
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    response
}

/// Gateway lifecycle errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Client registrations could not be loaded
    #[error("registry error: {0}")]
    Registry(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
