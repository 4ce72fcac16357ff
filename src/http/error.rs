//! Error responses.
//!
//! Every failure is reported as a JSON body with `exception`, `message` and
//! an optional `traceback`, and goes through the same signing layer as a
//! successful response.

use std::error::Error as _;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::protocol::ErrorBody;
use crate::engine::EngineError;
use crate::security::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("Malformed request body: {0}")]
    BadRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("No route for {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short error category reported in the `exception` field.
    pub fn exception(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "Unauthorized",
            Self::BadRequest(_) => "BadRequest",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::Engine(e) => e.kind(),
            Self::NotFound(_) => "NotFound",
            Self::Internal(_) => "InternalError",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            exception: self.exception().to_string(),
            message: self.to_string(),
            traceback: self.traceback(),
        }
    }

    /// Source chain of an engine failure, outermost first.
    fn traceback(&self) -> Option<String> {
        let Self::Engine(error) = self else {
            return None;
        };
        let mut lines = vec![format!("{}: {}", error.kind(), error)];
        let mut source = error.source();
        while let Some(cause) = source {
            lines.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Some(lines.join("\n"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(exception = self.exception(), error = %self, "Request failed");
        } else {
            tracing::debug!(exception = self.exception(), error = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
