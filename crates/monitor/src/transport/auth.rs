// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer auth middleware (spec.md §6 "Auth"). Grounded on
//! `coopmux::transport::auth`'s constant-time comparison and exemption
//! shape; authentication itself ("authentication token handling") is an
//! out-of-scope external collaborator per spec.md §1 — this module only
//! enforces the one inbound contract the core's HTTP surface states.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate a Bearer token from HTTP headers. `Ok(())` when auth is
/// disabled (no configured token).
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ()> {
    let expected = match expected {
        Some(tok) => tok,
        None => return Ok(()),
    };

    let header = headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or(())?;
    let token = header.strip_prefix("Bearer ").ok_or(())?;
    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(())
    }
}

#[derive(Serialize)]
struct UnauthorizedResponse {
    error: ErrorBody,
}

/// Axum middleware enforcing Bearer token auth on every route except
/// `GET /api/v1/health` (spec.md §6 "Auth").
pub async fn auth_layer(state: State<Arc<AppState>>, req: Request<axum::body::Body>, next: Next) -> Response {
    if req.uri().path() == "/api/v1/health" {
        return next.run(req).await;
    }

    if validate_bearer(req.headers(), state.config.auth_token.as_deref()).is_err() {
        let body = UnauthorizedResponse {
            error: ErrorBody { code: "UNAUTHORIZED".to_owned(), message: "unauthorized".to_owned() },
        };
        return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
