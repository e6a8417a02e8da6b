// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::jobs::JobError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Job(job_err) => {
                let (status, error_msg) = match job_err {
                    JobError::InvalidInput(e) => {
                        tracing::warn!(error = %e, "Invalid request");
                        (StatusCode::BAD_REQUEST, "Invalid request")
                    }
                    JobError::NotFound(id) => {
                        tracing::debug!(job_id = %id, "Job not found");
                        (StatusCode::NOT_FOUND, "Job not found")
                    }
                    JobError::CredentialConversion(e) => {
                        tracing::warn!(error = %e, "Cookie conversion failed");
                        (StatusCode::BAD_REQUEST, "Invalid cookies")
                    }
                    JobError::Probe(msg) => {
                        tracing::info!(message = %msg, "Metadata probe failed");
                        (StatusCode::BAD_REQUEST, "Metadata lookup failed")
                    }
                    JobError::ProbeTimeout(timeout) => {
                        tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Metadata probe timed out");
                        (StatusCode::GATEWAY_TIMEOUT, "Metadata lookup timed out")
                    }
                    JobError::Metadata(e) => {
                        tracing::error!(error = %e, "Malformed metadata");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Malformed metadata")
                    }
                    JobError::Launch { program, source } => {
                        tracing::error!(program = %program, error = %source, "Download tool unavailable");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Download tool unavailable")
                    }
                    JobError::Io { path, source } => {
                        tracing::error!(path = %path.display(), error = %source, "IO error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "IO error")
                    }
                    JobError::Process { .. } | JobError::ArtifactMissing | JobError::Canceled => {
                        tracing::error!(error = %job_err, "Unexpected job error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Job error")
                    }
                };
                (status, ErrorResponse::with_details(error_msg, job_err.to_string()))
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
