//! Service error types and their JSON wire representation.
//!
//! Every failure a caller can observe is funneled through [`Error`], which maps onto an HTTP
//! status and a JSON envelope with an `error` field. Nothing escapes the request boundary to
//! crash the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters of upstream HTML included in an extraction-failure response.
pub const DEBUG_SAMPLE_MAX_CHARS: usize = 800;

#[derive(ThisError, Debug)]
pub enum Error {
    /// No file attached under the expected form field. Rejected before any upstream call.
    #[error("No file")]
    MissingFile,

    /// Malformed inbound request (unreadable multipart payload)
    #[error("{message}")]
    BadRequest { message: String },

    /// The outbound call to the image host failed: network error, timeout, or error status
    #[error("Error uploading to Postimages")]
    UpstreamTransport { detail: String },

    /// The upstream call succeeded but no recognizable URL pattern matched the response
    #[error("Could not extract an image URL from the Postimages response")]
    ExtractionFailed { sample: Option<String> },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Wrap a reqwest failure, keeping the upstream status visible in the detail string
    /// when one was received.
    pub fn upstream(err: reqwest::Error) -> Self {
        let detail = match err.status() {
            Some(status) => format!("upstream returned {status}: {err}"),
            None => err.to_string(),
        };
        Error::UpstreamTransport { detail }
    }

    /// Build an extraction failure carrying a truncated prefix of the upstream body.
    ///
    /// The sample is only attached when `expose_sample` is set; it is capped at
    /// [`DEBUG_SAMPLE_MAX_CHARS`] characters.
    pub fn extraction_failed(body: &str, expose_sample: bool) -> Self {
        let sample = expose_sample.then(|| body.chars().take(DEBUG_SAMPLE_MAX_CHARS).collect());
        Error::ExtractionFailed { sample }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFile | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UpstreamTransport { .. } | Error::ExtractionFailed { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Other(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::MissingFile | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::UpstreamTransport { detail } => {
                tracing::error!(detail = %detail, "Upstream transport error");
            }
            Error::ExtractionFailed { .. } => {
                tracing::error!("Could not extract a URL from the Postimages response");
            }
            Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
        }

        let status = self.status_code();
        let body = match &self {
            Error::UpstreamTransport { detail } => json!({
                "error": self.user_message(),
                "detail": detail,
            }),
            Error::ExtractionFailed { sample: Some(sample) } => json!({
                "error": self.user_message(),
                "debugSample": sample,
            }),
            _ => json!({ "error": self.user_message() }),
        };

        (status, Json(body)).into_response()
    }
}
