// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request Coordinator (C7): fronts every outbound request to the
//! external pane-capture/agent collaborator with in-flight dedup for
//! screen requests, per-request timeouts, connection-state feedback, and
//! envelope translation (spec.md §4.7).
//!
//! Grounded on `coopmux::transport::http`'s forwarding handlers plus
//! `coopmux::upstream::client::UpstreamClient`, generalized from a
//! fire-and-forget proxy into a coordinator with its own in-flight map —
//! the teacher has no dedup layer of its own to imitate directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use crate::connection::{ConnectionState, RefreshResult};
use crate::error::{ErrorBody, MonitorError};
use crate::registry::Registry;
use crate::upstream::client::{TransportError, UpstreamClient, UpstreamResponse};

/// Capture mode for a screen request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    Text,
    Image,
}

impl ScreenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// A screen-capture request, as dedup-keyed by the coordinator.
#[derive(Debug, Clone)]
pub struct ScreenRequest {
    pub pane_id: String,
    pub mode: ScreenMode,
    pub lines: Option<u32>,
    pub cursor: Option<String>,
}

/// The coordinator's screen-request result. Always produced — the
/// coordinator never lets a screen request surface as an exception to the
/// caller (spec.md §4.7 "Screen error-response shape").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScreenResponse {
    pub ok: bool,
    #[serde(rename = "paneId")]
    pub pane_id: String,
    pub mode: String,
    #[serde(rename = "capturedAt")]
    pub captured_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// The envelope command endpoints always return — they never throw to
/// callers (spec.md §4.7 "Command endpoints always return a `{ ok, error?
/// }` envelope").
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommandEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// A translated query-path failure: query endpoints throw this instead of
/// returning an envelope (spec.md §4.7 "query endpoints throw a
/// translated error").
#[derive(Debug, Clone)]
pub struct TranslatedError {
    pub code: MonitorError,
    pub message: String,
    pub error_cause: Option<String>,
}

fn str_field<'a>(body: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = body;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

/// Translate one upstream HTTP response into a [`TranslatedError`] plus
/// whether it implies the pane should be dropped from the registry
/// (spec.md §4.7 envelope translation).
fn translate(resp: &UpstreamResponse) -> (TranslatedError, bool) {
    let server_message = str_field(&resp.body, &["error", "message"]);
    let server_code = str_field(&resp.body, &["error", "code"]);

    let mut message = match server_message {
        Some(m) => format!("{m} ({})", resp.status),
        None => format!("upstream responded with status {}", resp.status),
    };

    let error_cause = if resp.status == 500 {
        str_field(&resp.body, &["errorCause"]).map(str::to_owned)
    } else {
        None
    };

    if let Some(cause) = &error_cause {
        message.push_str(&format!("\nError cause: {cause}"));
    }

    let is_not_found_pane = server_code == Some("NOT_FOUND") && server_message == Some("pane not found");
    let remove_pane = resp.status == 410 || server_code == Some("INVALID_PANE") || is_not_found_pane;

    let code = if server_code == Some("INVALID_PANE") {
        MonitorError::InvalidPane
    } else if resp.status == 404 || resp.status == 410 || server_code == Some("NOT_FOUND") {
        MonitorError::NotFound
    } else if resp.status == 429 {
        MonitorError::RateLimit
    } else if resp.status == 400 {
        MonitorError::InvalidPayload
    } else {
        MonitorError::Internal
    };

    (TranslatedError { code, message, error_cause }, remove_pane)
}

fn refresh_result_for(resp: &UpstreamResponse) -> RefreshResult {
    RefreshResult {
        ok: resp.is_success(),
        status: Some(resp.status),
        auth_error: resp.status == 401 || resp.status == 403,
        rate_limited: resp.status == 429,
    }
}

fn transport_translated(err: &TransportError) -> TranslatedError {
    TranslatedError { code: MonitorError::Internal, message: err.to_string(), error_cause: None }
}

/// The refresh result a bare transport failure (no HTTP response at all)
/// implies for the Connection State Machine: not ok, no status, no
/// auth/rate-limit signal — just "not connected" (spec.md §4.8 "!ok
/// otherwise -> connected := false", §7.3 "Transport ... sets
/// connectionIssue at the connection layer").
fn transport_refresh_result() -> RefreshResult {
    RefreshResult { ok: false, status: None, auth_error: false, rate_limited: false }
}

/// Fronts every outbound request to the upstream pane-capture/agent
/// collaborator. Owns the in-flight screen-request map exclusively.
pub struct RequestCoordinator {
    client: UpstreamClient,
    connection: Arc<ConnectionState>,
    registry: Arc<Registry>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<Arc<ScreenResponse>>>>,
    mutation_timeout: Duration,
}

enum DedupAction {
    Await(broadcast::Receiver<Arc<ScreenResponse>>),
    Become(broadcast::Sender<Arc<ScreenResponse>>),
}

impl RequestCoordinator {
    pub fn new(
        client: UpstreamClient,
        connection: Arc<ConnectionState>,
        registry: Arc<Registry>,
        mutation_timeout: Duration,
    ) -> Self {
        Self { client, connection, registry, in_flight: Mutex::new(HashMap::new()), mutation_timeout }
    }

    fn screen_key(pane_id: &str, mode: ScreenMode, lines: Option<u32>, cursor: Option<&str>) -> String {
        let lines_part = lines.map(|l| l.to_string()).unwrap_or_else(|| "default".to_owned());
        let cursor_part = match mode {
            ScreenMode::Image => "",
            ScreenMode::Text => cursor.unwrap_or(""),
        };
        format!("{pane_id}:{}:{lines_part}:{cursor_part}", mode.as_str())
    }

    /// Apply connection-state and registry side effects implied by an
    /// upstream response, independent of whether the caller ultimately
    /// sees a thrown error or a `{ok:false}` envelope.
    async fn apply_side_effects(&self, pane_id: &str, resp: &UpstreamResponse, remove_pane: bool) {
        self.connection.apply(refresh_result_for(resp));
        if remove_pane {
            self.registry.remove(pane_id).await;
        }
    }

    /// In-flight-deduplicated screen capture. Never throws — synthesizes
    /// a failure [`ScreenResponse`] on any error (spec.md §4.7).
    pub async fn request_screen(&self, req: ScreenRequest, now_ms: u64) -> ScreenResponse {
        let direct_key = Self::screen_key(&req.pane_id, req.mode, req.lines, req.cursor.as_deref());
        let fallback_key = (req.mode == ScreenMode::Text && req.cursor.is_some())
            .then(|| Self::screen_key(&req.pane_id, req.mode, req.lines, None));

        let action = {
            let mut map = self.in_flight.lock().await;
            if let Some(tx) = map.get(&direct_key) {
                DedupAction::Await(tx.subscribe())
            } else if let Some(tx) = fallback_key.as_deref().and_then(|k| map.get(k)) {
                // Fallback: an identical-cursor request is not in flight,
                // but a no-cursor one is; reads are monotonic, so we can
                // await it instead of issuing a second upstream call.
                DedupAction::Await(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(1);
                map.insert(direct_key.clone(), tx.clone());
                DedupAction::Become(tx)
            }
        };

        match action {
            DedupAction::Await(mut rx) => match rx.recv().await {
                Ok(resp) => (*resp).clone(),
                // The initiator's task was dropped before broadcasting
                // (e.g. it panicked) — fetch directly rather than hang.
                Err(_) => self.fetch_screen(&req, now_ms).await,
            },
            DedupAction::Become(tx) => {
                let result = self.fetch_screen(&req, now_ms).await;
                self.in_flight.lock().await.remove(&direct_key);
                let _ = tx.send(Arc::new(result.clone()));
                result
            }
        }
    }

    async fn fetch_screen(&self, req: &ScreenRequest, now_ms: u64) -> ScreenResponse {
        let mode = req.mode.as_str();
        let body = serde_json::json!({
            "mode": mode,
            "lines": req.lines,
            "cursor": req.cursor,
        });

        match self.client.request_screen(&req.pane_id, &body).await {
            Ok(resp) if resp.is_success() => {
                self.connection.apply(refresh_result_for(&resp));
                ScreenResponse {
                    ok: true,
                    pane_id: req.pane_id.clone(),
                    mode: mode.to_owned(),
                    captured_at: now_ms,
                    data: resp.body.get("screen").cloned().or(Some(resp.body.clone())),
                    error: None,
                }
            }
            Ok(resp) => {
                let (translated, remove_pane) = translate(&resp);
                self.apply_side_effects(&req.pane_id, &resp, remove_pane).await;
                ScreenResponse {
                    ok: false,
                    pane_id: req.pane_id.clone(),
                    mode: mode.to_owned(),
                    captured_at: now_ms,
                    data: None,
                    error: Some(translated.code.to_error_body(translated.message)),
                }
            }
            Err(e) => {
                self.connection.apply(transport_refresh_result());
                ScreenResponse {
                    ok: false,
                    pane_id: req.pane_id.clone(),
                    mode: mode.to_owned(),
                    captured_at: now_ms,
                    data: None,
                    error: Some(MonitorError::Internal.to_error_body(e.to_string())),
                }
            }
        }
    }

    /// Generic command proxy: never throws, always returns `{ok, error?}`.
    async fn command_envelope(
        &self,
        pane_id: &str,
        call: impl std::future::Future<Output = Result<UpstreamResponse, TransportError>>,
    ) -> CommandEnvelope {
        match call.await {
            Ok(resp) if resp.is_success() => {
                self.connection.apply(refresh_result_for(&resp));
                CommandEnvelope { ok: true, error: None }
            }
            Ok(resp) => {
                let (translated, remove_pane) = translate(&resp);
                self.apply_side_effects(pane_id, &resp, remove_pane).await;
                CommandEnvelope { ok: false, error: Some(translated.code.to_error_body(translated.message)) }
            }
            Err(e) => {
                self.connection.apply(transport_refresh_result());
                let translated = transport_translated(&e);
                CommandEnvelope { ok: false, error: Some(translated.code.to_error_body(translated.message)) }
            }
        }
    }

    pub async fn send_keys(&self, pane_id: &str, body: Value) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.send_action(pane_id, "keys", &body)).await
    }

    pub async fn send_raw(&self, pane_id: &str, body: Value) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.send_action(pane_id, "raw", &body)).await
    }

    pub async fn touch(&self, pane_id: &str) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.command(pane_id, "touch")).await
    }

    pub async fn focus(&self, pane_id: &str) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.command(pane_id, "focus")).await
    }

    pub async fn kill_pane(&self, pane_id: &str) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.command(pane_id, "kill/pane")).await
    }

    pub async fn kill_window(&self, pane_id: &str) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.command(pane_id, "kill/window")).await
    }

    pub async fn set_title(&self, pane_id: &str, body: Value) -> CommandEnvelope {
        self.command_envelope(pane_id, self.client.set_title(pane_id, &body)).await
    }

    /// `send/text` carries the 10s mutation timeout class (spec.md §4.7).
    pub async fn send_text(&self, pane_id: &str, body: Value) -> CommandEnvelope {
        match tokio::time::timeout(self.mutation_timeout, self.client.send_action(pane_id, "text", &body)).await
        {
            Ok(Ok(resp)) if resp.is_success() => {
                self.connection.apply(refresh_result_for(&resp));
                CommandEnvelope { ok: true, error: None }
            }
            Ok(Ok(resp)) => {
                let (translated, remove_pane) = translate(&resp);
                self.apply_side_effects(pane_id, &resp, remove_pane).await;
                CommandEnvelope { ok: false, error: Some(translated.code.to_error_body(translated.message)) }
            }
            Ok(Err(e)) => {
                self.connection.apply(transport_refresh_result());
                let translated = transport_translated(&e);
                CommandEnvelope { ok: false, error: Some(translated.code.to_error_body(translated.message)) }
            }
            Err(_elapsed) => CommandEnvelope {
                ok: false,
                error: Some(MonitorError::Internal.to_error_body("send/text timed out")),
            },
        }
    }

    /// `launch-agent` carries the 10s mutation timeout class and is a
    /// query-shaped call: it throws a [`TranslatedError`] rather than
    /// returning `{ok,error?}`, since launch responses carry session
    /// identity the caller needs on success (spec.md §6 endpoint table).
    pub async fn launch(&self, body: Value) -> Result<Value, TranslatedError> {
        match tokio::time::timeout(self.mutation_timeout, self.client.launch(&body)).await {
            Ok(Ok(resp)) if resp.is_success() => {
                self.connection.apply(refresh_result_for(&resp));
                Ok(resp.body)
            }
            Ok(Ok(resp)) => {
                let (translated, remove_pane) = translate(&resp);
                // Launch has no single target pane yet; only apply the
                // connection-state half of the side effects.
                self.connection.apply(refresh_result_for(&resp));
                let _ = remove_pane;
                Err(translated)
            }
            Ok(Err(e)) => {
                self.connection.apply(transport_refresh_result());
                Err(transport_translated(&e))
            }
            Err(_elapsed) => {
                Err(TranslatedError { code: MonitorError::Internal, message: "launch timed out".to_owned(), error_cause: None })
            }
        }
    }

    /// Refresh the session registry from upstream. Used by the Polling
    /// Driver (C10); throws a [`TranslatedError`] on failure so the
    /// caller can decide how to log it, but always applies connection
    /// side effects first.
    pub async fn refresh_sessions(&self) -> Result<Vec<crate::registry::SessionSummary>, TranslatedError> {
        match self.client.list_sessions().await {
            Ok(resp) if resp.is_success() => {
                self.connection.apply(refresh_result_for(&resp));
                let sessions = resp
                    .body
                    .get("sessions")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| TranslatedError {
                        code: MonitorError::Internal,
                        message: format!("malformed sessions payload: {e}"),
                        error_cause: None,
                    })?
                    .unwrap_or_default();
                Ok(sessions)
            }
            Ok(resp) => {
                self.connection.apply(refresh_result_for(&resp));
                Err(translate(&resp).0)
            }
            Err(e) => {
                self.connection.apply(transport_refresh_result());
                Err(transport_translated(&e))
            }
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
