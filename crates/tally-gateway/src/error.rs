// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of [`TallyError`] onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tally_core::TallyError;
use tracing::error;

/// Body of every error response.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    /// `{"error": "..."}`
    Single { error: String },
    /// `{"errors": ["...", ...]}`
    Many { errors: Vec<String> },
}

/// An error ready to be sent to the client.
///
/// Internal details never reach the body; server-side failures answer
/// `{"error":"Internal server error"}` and are logged instead.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::Single {
                error: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TallyError> for ApiError {
    fn from(e: TallyError) -> Self {
        match e {
            TallyError::NotFound { entity } => Self::not_found(format!("{entity} not found")),
            TallyError::BadRequest(message) => Self::bad_request(message),
            TallyError::Validation(errors) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: ErrorBody::Many { errors },
            },
            other => {
                error!(error = %other, transient = other.is_transient(), "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
