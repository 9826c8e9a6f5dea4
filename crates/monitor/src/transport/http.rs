// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the monitor: spec.md §6's endpoint table.
//!
//! Grounded on `coopmux::transport::http`'s handler idiom (thin extractors,
//! state pulled through `Arc<AppState>`, `(StatusCode, Json<_>)` as the
//! uniform handler return type) but generalized from a session-proxy
//! surface to the timeline-query + request-coordinator surface this
//! monitor actually exposes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use timeline::{RangeTag, RepoTimelineQuery, TimelineQuery};

use crate::coordinator::{ScreenMode, ScreenRequest};
use crate::error::MonitorError;
use crate::pane_id::decode_path_segment;
use crate::registry::SessionSummary;
use crate::state::{epoch_ms, AppState};

fn decode(raw: &str) -> String {
    decode_path_segment(raw)
}

// -- GET /api/v1/health --------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

// -- GET /sessions --------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
    #[serde(rename = "connectionStatus")]
    pub connection_status: crate::connection::ConnectionStatus,
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.registry.list().await;
    Json(SessionsResponse { sessions, connection_status: state.connection.status() })
}

// -- POST /sessions/:paneId/screen -----------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScreenBody {
    #[serde(default = "default_mode")]
    pub mode: String,
    pub lines: Option<u32>,
    pub cursor: Option<String>,
}

fn default_mode() -> String {
    "text".to_owned()
}

pub async fn screen(
    State(state): State<Arc<AppState>>,
    Path(raw_pane_id): Path<String>,
    Json(body): Json<ScreenBody>,
) -> impl IntoResponse {
    let pane_id = decode(&raw_pane_id);
    if pane_id.is_empty() {
        return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
    }
    let Some(mode) = ScreenMode::parse(&body.mode) else {
        return MonitorError::InvalidPayload.to_http_response(format!("unknown mode {}", body.mode)).into_response();
    };

    let req = ScreenRequest { pane_id, mode, lines: body.lines, cursor: body.cursor };
    let screen = state.coordinator.request_screen(req, epoch_ms()).await;
    Json(serde_json::json!({ "screen": screen })).into_response()
}

// -- GET /sessions/:paneId/timeline ----------------------------------------

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    #[serde(default = "default_scope")]
    pub scope: String,
    pub range: Option<String>,
    pub limit: Option<usize>,
}

fn default_scope() -> String {
    "pane".to_owned()
}

pub async fn timeline(
    State(state): State<Arc<AppState>>,
    Path(raw_pane_id): Path<String>,
    Query(params): Query<TimelineParams>,
) -> impl IntoResponse {
    let pane_id = decode(&raw_pane_id);
    if pane_id.is_empty() {
        return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
    }

    let range = match params.range.as_deref() {
        Some(s) => match RangeTag::parse(s) {
            Some(r) => r,
            None => {
                return MonitorError::InvalidPayload
                    .to_http_response(format!("unknown range {s}"))
                    .into_response()
            }
        },
        None => RangeTag::OneHour,
    };

    let mut store = state.timeline.write().await;

    match params.scope.as_str() {
        "pane" => {
            let mut query = TimelineQuery::new(pane_id).range(range);
            if let Some(limit) = params.limit {
                query = query.limit(limit);
            }
            match store.get_timeline(&query) {
                Ok(t) => Json(t).into_response(),
                Err(e) => MonitorError::from(e).to_http_response("invalid timeline query").into_response(),
            }
        }
        "repo" => {
            let Some(summary) = state.registry.get(&pane_id).await else {
                return MonitorError::NotFound.to_http_response("pane not found").into_response();
            };
            let Some(repo_root) = summary.repo_root.clone() else {
                return MonitorError::InvalidPayload
                    .to_http_response("pane has no repoRoot to scope a repo timeline by")
                    .into_response();
            };
            let pane_ids = state.registry.pane_ids_for_repo(&repo_root).await;
            let mut query = RepoTimelineQuery::new(pane_id, pane_ids).range(range);
            if let Some(limit) = params.limit {
                query = query.limit(limit);
            }
            match store.get_repo_timeline(&query) {
                Ok(t) => Json(t).into_response(),
                Err(e) => MonitorError::from(e).to_http_response("invalid timeline query").into_response(),
            }
        }
        other => MonitorError::InvalidPayload
            .to_http_response(format!("unknown scope {other}"))
            .into_response(),
    }
}

// -- POST /sessions/:paneId/send/text|keys|raw -----------------------------

#[derive(Debug, Deserialize)]
pub struct SendTextBody {
    pub text: String,
    #[serde(default)]
    pub enter: bool,
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
}

pub async fn send_text(
    State(state): State<Arc<AppState>>,
    Path(raw_pane_id): Path<String>,
    Json(body): Json<SendTextBody>,
) -> impl IntoResponse {
    let pane_id = decode(&raw_pane_id);
    if pane_id.is_empty() {
        return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
    }
    let request_id = body.request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let upstream_body = serde_json::json!({
        "text": body.text,
        "enter": body.enter,
        "requestId": request_id,
    });
    Json(state.coordinator.send_text(&pane_id, upstream_body).await).into_response()
}

pub async fn send_keys(
    State(state): State<Arc<AppState>>,
    Path(raw_pane_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let pane_id = decode(&raw_pane_id);
    if pane_id.is_empty() {
        return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
    }
    Json(state.coordinator.send_keys(&pane_id, body).await).into_response()
}

pub async fn send_raw(
    State(state): State<Arc<AppState>>,
    Path(raw_pane_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let pane_id = decode(&raw_pane_id);
    if pane_id.is_empty() {
        return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
    }
    Json(state.coordinator.send_raw(&pane_id, body).await).into_response()
}

// -- POST /sessions/:paneId/touch|focus|kill/pane|kill/window --------------

macro_rules! command_handler {
    ($name:ident, $method:ident) => {
        pub async fn $name(
            State(state): State<Arc<AppState>>,
            Path(raw_pane_id): Path<String>,
        ) -> impl IntoResponse {
            let pane_id = decode(&raw_pane_id);
            if pane_id.is_empty() {
                return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
            }
            Json(state.coordinator.$method(&pane_id).await).into_response()
        }
    };
}

command_handler!(touch, touch);
command_handler!(focus, focus);
command_handler!(kill_pane, kill_pane);
command_handler!(kill_window, kill_window);

// -- PUT /sessions/:paneId/title --------------------------------------------

pub async fn set_title(
    State(state): State<Arc<AppState>>,
    Path(raw_pane_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let pane_id = decode(&raw_pane_id);
    if pane_id.is_empty() {
        return MonitorError::InvalidPane.to_http_response("pane id is empty").into_response();
    }
    Json(state.coordinator.set_title(&pane_id, body).await).into_response()
}

// -- POST /sessions/launch --------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LaunchBody {
    #[serde(rename = "sessionName")]
    pub session_name: String,
    pub agent: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "windowName")]
    pub window_name: Option<String>,
    pub cwd: Option<String>,
    #[serde(rename = "agentOptions")]
    pub agent_options: Option<Value>,
    #[serde(rename = "worktreePath")]
    pub worktree_path: Option<String>,
    #[serde(rename = "worktreeBranch")]
    pub worktree_branch: Option<String>,
    #[serde(rename = "worktreeCreateIfMissing", default)]
    pub worktree_create_if_missing: bool,
}

/// `cwd` is mutually exclusive with `worktree*`; `worktreeCreateIfMissing`
/// requires `worktreeBranch` (spec.md §6 endpoint table, `/sessions/launch`).
fn validate_launch(body: &LaunchBody) -> Result<(), String> {
    let has_worktree = body.worktree_path.is_some() || body.worktree_branch.is_some();
    if body.cwd.is_some() && has_worktree {
        return Err("cwd is mutually exclusive with worktreePath/worktreeBranch".to_owned());
    }
    if body.worktree_create_if_missing && body.worktree_branch.is_none() {
        return Err("worktreeCreateIfMissing requires worktreeBranch".to_owned());
    }
    Ok(())
}

pub async fn launch(State(state): State<Arc<AppState>>, Json(body): Json<LaunchBody>) -> impl IntoResponse {
    if let Err(message) = validate_launch(&body) {
        return MonitorError::InvalidPayload.to_http_response(message).into_response();
    }

    let upstream_body = serde_json::json!({
        "sessionName": body.session_name,
        "agent": body.agent,
        "requestId": body.request_id,
        "windowName": body.window_name,
        "cwd": body.cwd,
        "agentOptions": body.agent_options,
        "worktreePath": body.worktree_path,
        "worktreeBranch": body.worktree_branch,
        "worktreeCreateIfMissing": body.worktree_create_if_missing,
    });

    match state.coordinator.launch(upstream_body).await {
        Ok(value) => Json(value).into_response(),
        Err(translated) => translated
            .code
            .to_http_response_with_cause(translated.message, translated.error_cause)
            .into_response(),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
