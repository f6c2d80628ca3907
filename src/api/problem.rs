//! Mapping of [`AppointmentError`] to RFC 9457 problem-details responses.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::AppointmentError;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Non-standard status used when the caller went away before the response.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Error returned from HTTP handlers.
#[derive(Debug)]
pub struct ApiError(pub AppointmentError);

impl From<AppointmentError> for ApiError {
    fn from(err: AppointmentError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppointmentError::NotFound(_) => StatusCode::NOT_FOUND,
            AppointmentError::Concurrency => StatusCode::PRECONDITION_FAILED,
            AppointmentError::Validation(_) | AppointmentError::InvalidPatch(_) => {
                StatusCode::BAD_REQUEST
            }
            AppointmentError::Canceled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::BAD_REQUEST),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn problem(&self) -> ProblemDetails {
        let status = self.status();
        let (kind, title) = match &self.0 {
            AppointmentError::NotFound(_) => (
                "https://tools.ietf.org/html/rfc9110#section-15.5.5",
                "Requested item is not found",
            ),
            AppointmentError::Concurrency => (
                "https://tools.ietf.org/html/rfc9110#section-15.5.13",
                "Precondition Failed.",
            ),
            AppointmentError::Validation(_) => (
                "https://tools.ietf.org/html/rfc9110#section-15.5.1",
                "Bad request",
            ),
            AppointmentError::InvalidPatch(_) => (
                "https://tools.ietf.org/html/rfc9110#section-15.5.1",
                "Malformed patch document",
            ),
            AppointmentError::Canceled => ("about:blank", "Client closed request."),
            _ => (
                "https://tools.ietf.org/html/rfc9110#section-15.6.1",
                "An error occurred while processing your request.",
            ),
        };

        // Internal faults are logged, not echoed to the caller.
        let detail = self.0.is_client_error().then(|| self.0.to_string());

        ProblemDetails {
            kind: kind.to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !self.0.is_client_error() {
            error!(error = %self.0, "request failed");
        }
        let status = self.status();
        (
            status,
            [(header::CONTENT_TYPE, PROBLEM_JSON)],
            Json(self.problem()),
        )
            .into_response()
    }
}
