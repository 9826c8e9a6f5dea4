// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the one external pane-capture/agent collaborator this
//! monitor fronts (spec.md §1 "pane-capture source"). Grounded on
//! `coopmux::upstream::client::UpstreamClient`'s thin-wrapper shape, with
//! methods renamed to the endpoint table in spec.md §6 instead of the
//! teacher's `coop` process endpoints.

use reqwest::Client;
use serde_json::Value;

use crate::pane_id::encode_path_segment;

/// A transport-layer failure: network error, timeout, or a connection
/// that never produced an HTTP response. Distinguished from a well-formed
/// non-2xx response, which is returned as `Ok` with the observed status
/// so the coordinator can translate it per spec.md §4.7/§7.
#[derive(Debug)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError("request timed out".to_owned())
        } else {
            TransportError(e.to_string())
        }
    }
}

/// One HTTP response from the upstream collaborator: status code plus a
/// best-effort parsed JSON body (`Value::Null` for an empty body).
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Thin HTTP client wrapping the base URL and bearer token of the one
/// upstream pane-capture collaborator this process talks to. Per-request
/// timeout classes (10s for send-text/launch-agent, transport default
/// otherwise) are applied by the Request Coordinator, not here.
pub struct UpstreamClient {
    base_url: String,
    auth_token: Option<String>,
    client: Client,
}

impl UpstreamClient {
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        let client = Client::builder().build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), auth_token, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn pane_path(&self, pane_id: &str, suffix: &str) -> String {
        format!("/sessions/{}{}", encode_path_segment(pane_id), suffix)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<UpstreamResponse, TransportError> {
        let resp = self.apply_auth(req).send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok(UpstreamResponse { status, body })
    }

    /// `GET /sessions` — registry snapshot source.
    pub async fn list_sessions(&self) -> Result<UpstreamResponse, TransportError> {
        self.send(self.client.get(self.url("/sessions"))).await
    }

    /// `POST /sessions/:paneId/screen`.
    pub async fn request_screen(
        &self,
        pane_id: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, TransportError> {
        let req = self.client.post(self.url(&self.pane_path(pane_id, "/screen"))).json(body);
        self.send(req).await
    }

    /// `POST /sessions/:paneId/send/text|keys|raw`.
    pub async fn send_action(
        &self,
        pane_id: &str,
        kind: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, TransportError> {
        let req =
            self.client.post(self.url(&self.pane_path(pane_id, &format!("/send/{kind}")))).json(body);
        self.send(req).await
    }

    /// `POST /sessions/:paneId/touch|focus|kill/pane|kill/window`.
    pub async fn command(&self, pane_id: &str, suffix: &str) -> Result<UpstreamResponse, TransportError> {
        let req = self.client.post(self.url(&self.pane_path(pane_id, &format!("/{suffix}"))));
        self.send(req).await
    }

    /// `PUT /sessions/:paneId/title`.
    pub async fn set_title(&self, pane_id: &str, body: &Value) -> Result<UpstreamResponse, TransportError> {
        let req = self.client.put(self.url(&self.pane_path(pane_id, "/title"))).json(body);
        self.send(req).await
    }

    /// `POST /sessions/launch`.
    pub async fn launch(&self, body: &Value) -> Result<UpstreamResponse, TransportError> {
        let req = self.client.post(self.url("/sessions/launch")).json(body);
        self.send(req).await
    }
}
