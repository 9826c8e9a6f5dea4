// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use timeline::store::{DEFAULT_MAX_ITEMS_PER_PANE, DEFAULT_RETENTION_MS};

/// Configuration for the monitor process.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "monitor", about = "Multi-pane agent-session monitor")]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "MONITOR_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9800, env = "MONITOR_PORT")]
    pub port: u16,

    /// Bearer token for inbound API auth. If unset, auth is disabled.
    #[arg(long, env = "MONITOR_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Base URL of the upstream pane-capture/agent collaborator.
    #[arg(long, env = "MONITOR_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Bearer token presented to the upstream collaborator, if required.
    #[arg(long, env = "MONITOR_UPSTREAM_TOKEN")]
    pub upstream_token: Option<String>,

    /// Timeline retention window in milliseconds.
    #[arg(long, default_value_t = DEFAULT_RETENTION_MS, env = "MONITOR_RETENTION_MS")]
    pub retention_ms: u64,

    /// Maximum retained timeline events per pane.
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS_PER_PANE, env = "MONITOR_MAX_ITEMS_PER_PANE")]
    pub max_items_per_pane: usize,

    /// Base polling tick, before any rate-limit backoff is added.
    #[arg(long, default_value_t = 1000, env = "MONITOR_POLL_MS")]
    pub poll_ms: u64,

    /// Timeout, in milliseconds, applied to send-text and launch-agent requests.
    #[arg(long, default_value_t = 10_000, env = "MONITOR_MUTATION_TIMEOUT_MS")]
    pub mutation_timeout_ms: u64,
}

impl Config {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_ms)
    }

    pub fn mutation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.mutation_timeout_ms)
    }
}
