//! Failures of a streaming request and their HTTP mapping.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::{MediaId, RangeNotSatisfiable};

/// Errors returned by [`StreamingService::stream`](crate::StreamingService::stream).
///
/// None of them is retried here; the HTTP layer decides what to do.
#[derive(Debug, Error)]
pub enum StreamError {
    /// No media item with this id exists.
    #[error("media not found with id: {0}")]
    NotFound(MediaId),

    /// Anonymous caller asked for media that needs an authenticated caller.
    #[error("authentication required to stream media {0}")]
    Unauthorized(MediaId),

    /// Authenticated caller lacks a role the media requires.
    #[error("not allowed to stream media {0}")]
    Forbidden(MediaId),

    /// The `Range` header cannot be served against the current size.
    #[error(transparent)]
    RangeNotSatisfiable(#[from] RangeNotSatisfiable),

    /// The backing object is missing, unreadable, or failed mid-operation.
    #[error("{reason}: {locator}")]
    Storage {
        locator: String,
        reason: &'static str,
        #[source]
        source: Option<io::Error>,
    },
}

impl StreamError {
    pub(crate) fn storage(locator: &str, reason: &'static str, source: Option<io::Error>) -> Self {
        StreamError::Storage {
            locator: locator.to_string(),
            reason,
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StreamError::NotFound(_) => StatusCode::NOT_FOUND,
            StreamError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StreamError::Forbidden(_) => StatusCode::FORBIDDEN,
            StreamError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            StreamError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            StreamError::NotFound(_) => "MEDIA_NOT_FOUND",
            StreamError::Unauthorized(_) => "UNAUTHORIZED",
            StreamError::Forbidden(_) => "FORBIDDEN",
            StreamError::RangeNotSatisfiable(_) => "RANGE_NOT_SATISFIABLE",
            StreamError::Storage { .. } => "STORAGE_ERROR",
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            // 416 carries only the Content-Range header, no body
            StreamError::RangeNotSatisfiable(err) => return (*err).into_response(),
            StreamError::Storage { locator, source, .. } => {
                tracing::error!(
                    status = %status,
                    locator = %locator,
                    error = %self,
                    source = source.as_ref().map(tracing::field::display),
                    "storage failure while streaming"
                );
            }
            _ => {}
        }

        let body = json!({
            "status": status.as_u16(),
            "error": self.code(),
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
