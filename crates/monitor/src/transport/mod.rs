// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the monitor: the endpoint table in spec.md §6.
//!
//! Grounded on `coopmux::transport::build_router`'s layer order (auth,
//! then CORS, then state) with the teacher's dashboard/WebSocket/credential
//! routes dropped — this monitor has no UI of its own and no credential
//! broker; it is a pure JSON API fronting one upstream collaborator.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with every route in spec.md §6's endpoint table.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/sessions", get(http::list_sessions))
        .route("/sessions/launch", post(http::launch))
        .route("/sessions/{pane_id}/screen", post(http::screen))
        .route("/sessions/{pane_id}/timeline", get(http::timeline))
        .route("/sessions/{pane_id}/send/text", post(http::send_text))
        .route("/sessions/{pane_id}/send/keys", post(http::send_keys))
        .route("/sessions/{pane_id}/send/raw", post(http::send_raw))
        .route("/sessions/{pane_id}/touch", post(http::touch))
        .route("/sessions/{pane_id}/focus", post(http::focus))
        .route("/sessions/{pane_id}/kill/pane", post(http::kill_pane))
        .route("/sessions/{pane_id}/kill/window", post(http::kill_window))
        .route("/sessions/{pane_id}/title", put(http::set_title))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
