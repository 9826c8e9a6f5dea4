// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection State Machine (C8): healthy/degraded/disconnected, with
//! auth-block and rate-limit backoff (spec.md §4.8).
//!
//! Re-purposes the teacher's health-checker failure-counting loop
//! (`coopmux::upstream::health::spawn_health_checker`) as an explicit
//! state machine rather than an eviction counter — the mux proxy counts
//! failures toward evicting a session; the monitor instead exposes a
//! connection status and a backoff hint to its own Polling Driver.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// The outcome of one refresh attempt against the upstream collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshResult {
    pub ok: bool,
    pub status: Option<u16>,
    pub auth_error: bool,
    pub rate_limited: bool,
}

/// Externally observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Healthy,
    Degraded,
    Disconnected,
}

const MAX_RATE_LIMIT_STEP: u8 = 3;
const RATE_LIMIT_STEP_MS: u64 = 5_000;

/// Tracks connectivity to the upstream pane-capture collaborator.
///
/// Plain atomics, not a `Mutex` wrapping a struct: every field transitions
/// independently and the combinations that matter are read back out
/// through [`ConnectionState::status`], which tolerates a torn read the
/// same way the teacher's health checker tolerates one stale failure
/// count — the next tick corrects it.
#[derive(Default)]
pub struct ConnectionState {
    has_token: AtomicBool,
    connected: AtomicBool,
    auth_blocked: AtomicBool,
    rate_limit_step: AtomicU8,
}

impl ConnectionState {
    pub fn new(has_token: bool) -> Self {
        Self {
            has_token: AtomicBool::new(has_token),
            connected: AtomicBool::new(false),
            auth_blocked: AtomicBool::new(false),
            rate_limit_step: AtomicU8::new(0),
        }
    }

    /// Apply the result of one refresh attempt, per the transition table
    /// in spec.md §4.8.
    pub fn apply(&self, result: RefreshResult) {
        if !result.ok && result.auth_error {
            self.auth_blocked.store(true, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            return;
        }

        if !result.ok && result.rate_limited {
            let step = self.rate_limit_step.load(Ordering::SeqCst);
            let next = (step + 1).min(MAX_RATE_LIMIT_STEP);
            self.rate_limit_step.store(next, Ordering::SeqCst);
            self.connected.store(true, Ordering::SeqCst);
            return;
        }

        if !result.ok {
            self.connected.store(false, Ordering::SeqCst);
            return;
        }

        self.connected.store(true, Ordering::SeqCst);
        self.auth_blocked.store(false, Ordering::SeqCst);
        self.rate_limit_step.store(0, Ordering::SeqCst);
    }

    /// Milliseconds of extra polling delay the current rate-limit step
    /// implies. Zero once a successful refresh has cleared the step.
    pub fn poll_backoff_ms(&self) -> u64 {
        self.rate_limit_step.load(Ordering::SeqCst) as u64 * RATE_LIMIT_STEP_MS
    }

    pub fn is_auth_blocked(&self) -> bool {
        self.auth_blocked.load(Ordering::SeqCst)
    }

    /// Computed status: no token or auth-blocked wins first; else
    /// connected-with-backoff is degraded; else connected is healthy;
    /// anything else (not connected, no auth block) is degraded.
    pub fn status(&self) -> ConnectionStatus {
        if !self.has_token.load(Ordering::SeqCst) || self.is_auth_blocked() {
            return ConnectionStatus::Disconnected;
        }
        let connected = self.connected.load(Ordering::SeqCst);
        if connected && self.poll_backoff_ms() > 0 {
            return ConnectionStatus::Degraded;
        }
        if connected {
            return ConnectionStatus::Healthy;
        }
        ConnectionStatus::Degraded
    }

    /// Clear auth-block and rate-limit state, e.g. on `reconnect()` or a
    /// token change. Does not itself trigger a refresh; the caller does.
    pub fn reset(&self, has_token: bool) {
        self.has_token.store(has_token, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.auth_blocked.store(false, Ordering::SeqCst);
        self.rate_limit_step.store(0, Ordering::SeqCst);
    }

    /// `reconnect()`: clear the auth block, leaving connectivity and backoff
    /// state for the refresh that follows to re-establish. Per spec.md §4.8
    /// "clears auth-block and triggers a refresh", the refresh itself is
    /// triggered by the caller ([`crate::polling::PollingDriver::reconnect`]).
    pub fn reconnect(&self) {
        self.auth_blocked.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
