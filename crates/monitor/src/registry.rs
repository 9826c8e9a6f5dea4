// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Registry (C9): a thin `paneId -> latest session summary` map.
//!
//! Routine by design (spec.md §4.9) — no retry/backoff logic lives here,
//! that belongs to the Polling Driver (C10) and Connection State Machine
//! (C8) that call into it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// External, read-only (from this crate's perspective) summary of one
/// pane's session, as published by the upstream pane-capture collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(rename = "paneId")]
    pub pane_id: String,
    #[serde(rename = "sessionName")]
    pub session_name: String,
    pub state: String,
    pub agent: String,
    #[serde(rename = "repoRoot", skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(rename = "worktreePath", skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    #[serde(rename = "customTitle", skip_serializing_if = "Option::is_none")]
    pub custom_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "lastInputAt", skip_serializing_if = "Option::is_none")]
    pub last_input_at: Option<u64>,
    #[serde(rename = "paneDead", default)]
    pub pane_dead: bool,
    /// Catch-all for fields this crate does not interpret but must not
    /// drop on the way back out to clients.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `paneId -> latest SessionSummary`. Guarded by a single `RwLock`; all
/// operations are in-memory and run to completion without suspension.
#[derive(Default)]
pub struct Registry {
    sessions: RwLock<HashMap<String, SessionSummary>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry with a freshly polled snapshot,
    /// deduplicating by `paneId` and keeping the last entry for each key.
    pub async fn apply_snapshot(&self, summaries: Vec<SessionSummary>) {
        let mut map = HashMap::with_capacity(summaries.len());
        for summary in summaries {
            map.insert(summary.pane_id.clone(), summary);
        }
        *self.sessions.write().await = map;
    }

    /// Upsert a single pane's summary.
    pub async fn update(&self, summary: SessionSummary) {
        self.sessions.write().await.insert(summary.pane_id.clone(), summary);
    }

    /// Remove a pane, e.g. on a `410`/`INVALID_PANE`/"pane not found"
    /// response observed by the Request Coordinator.
    pub async fn remove(&self, pane_id: &str) {
        self.sessions.write().await.remove(pane_id);
    }

    pub async fn get(&self, pane_id: &str) -> Option<SessionSummary> {
        self.sessions.read().await.get(pane_id).cloned()
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// All pane ids that currently share `repo_root`, used to resolve a
    /// `scope=repo` timeline query's pane set from one target pane.
    pub async fn pane_ids_for_repo(&self, repo_root: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.repo_root.as_deref() == Some(repo_root))
            .map(|s| s.pane_id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
