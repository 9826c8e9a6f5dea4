// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed error-code taxonomy for the monitor's HTTP envelope (spec.md §6/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorError {
    /// Malformed or empty pane id.
    InvalidPane,
    /// The pane no longer exists in the registry.
    NotFound,
    /// Malformed query/body (bad enum, out-of-range limit, …).
    InvalidPayload,
    /// Upstream signaled 429; feeds connection backoff without failing hard.
    RateLimit,
    /// Transport failure, timeout, or 5xx from the upstream collaborator.
    Internal,
}

impl MonitorError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidPane => 400,
            Self::NotFound => 404,
            Self::InvalidPayload => 400,
            Self::RateLimit => 429,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPane => "INVALID_PANE",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::RateLimit => "RATE_LIMIT",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        self.to_http_response_with_cause(message, None)
    }

    /// As `to_http_response`, but with an optional `errorCause` second line,
    /// used when a 500 response carries a server-supplied cause string.
    pub fn to_http_response_with_cause(
        &self,
        message: impl Into<String>,
        error_cause: Option<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message), error_cause };
        (status, Json(body))
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope: `{ error: {...}, errorCause? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    #[serde(rename = "errorCause", skip_serializing_if = "Option::is_none")]
    pub error_cause: Option<String>,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<timeline::error::TimelineError> for MonitorError {
    fn from(_: timeline::error::TimelineError) -> Self {
        // The timeline crate's sole error variant (InvalidPayload) always
        // reflects a malformed query, never a missing pane.
        MonitorError::InvalidPayload
    }
}
