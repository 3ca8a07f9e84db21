//! Response mapping.
//!
//! # Responsibilities
//! - Map admission and execution failures to HTTP status codes
//! - Pass successful query output through unchanged
//!
//! # Design Decisions
//! - Admission timeouts are 503 so clients and balancers back off
//! - Exhausted query budgets are 504; query node failures are 502
//! - Query node 4xx answers (bad query syntax) are passed through

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::admission::AdmissionError;
use crate::query::{QueryError, QueryResponse};

/// Everything the query path can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("unsupported path: {0}")]
    NotFound(String),

    #[error("cannot read request body: {0}")]
    BadRequest(String),

    #[error("query worker failed: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Admission(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Query(QueryError::DeadlineExceeded(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Query(QueryError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Query(QueryError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Query(QueryError::UpstreamStatus { status, .. }) => {
                match StatusCode::from_u16(*status) {
                    Ok(code) if code.is_client_error() => code,
                    _ => StatusCode::BAD_GATEWAY,
                }
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure should be logged when turned into a response.
    ///
    /// Admission rejections are logged by the controller, with the request
    /// identity attached.
    pub fn should_log(&self) -> bool {
        self.status_code().is_server_error() && !matches!(self, ApiError::Admission(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.should_log() {
            tracing::warn!(status = status.as_u16(), error = %self, "Query request failed");
        }
        (status, self.to_string()).into_response()
    }
}

impl IntoResponse for QueryResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}
