// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling Driver (C10): ticks the registry refresh every
//! `1000ms + pollBackoffMs` while the consumer is visible and online,
//! honoring the Connection State Machine's backoff (spec.md §4.10).
//!
//! Grounded on `coopmux::upstream::poller::spawn_screen_poller`'s
//! tick/cancel shape, generalized from a per-session screen/status poll
//! into a single registry-wide refresh driven by visibility/online gates
//! instead of a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::coordinator::RequestCoordinator;
use crate::registry::Registry;

/// Default base tick, used when not overridden by `Config::poll_ms`
/// (spec.md §4.10: "every `1000ms + pollBackoffMs`").
pub const DEFAULT_BASE_TICK_MS: u64 = 1000;

/// Gate flags the driver honors: it only ticks while both are true, but
/// always issues one refresh immediately on a hidden/offline -> visible
/// transition (spec.md §4.10 "still issues one refresh on resume").
pub struct PollingGates {
    visible: watch::Sender<bool>,
    online: watch::Sender<bool>,
}

impl Default for PollingGates {
    fn default() -> Self {
        let (visible, _) = watch::channel(true);
        let (online, _) = watch::channel(true);
        Self { visible, online }
    }
}

impl PollingGates {
    pub fn set_visible(&self, visible: bool) {
        let _ = self.visible.send(visible);
    }

    pub fn set_online(&self, online: bool) {
        let _ = self.online.send(online);
    }

    fn active(&self) -> bool {
        *self.visible.borrow() && *self.online.borrow()
    }
}

/// Drives [`Registry`] refreshes via the [`RequestCoordinator`], honoring
/// the Connection State Machine's rate-limit backoff.
pub struct PollingDriver {
    coordinator: Arc<RequestCoordinator>,
    registry: Arc<Registry>,
    connection: Arc<crate::connection::ConnectionState>,
    gates: Arc<PollingGates>,
    base_tick_ms: u64,
}

impl PollingDriver {
    pub fn new(
        coordinator: Arc<RequestCoordinator>,
        registry: Arc<Registry>,
        connection: Arc<crate::connection::ConnectionState>,
        gates: Arc<PollingGates>,
        base_tick_ms: u64,
    ) -> Self {
        Self { coordinator, registry, connection, gates, base_tick_ms }
    }

    async fn refresh_once(&self) {
        match self.coordinator.refresh_sessions().await {
            Ok(summaries) => self.registry.apply_snapshot(summaries).await,
            Err(e) => tracing::warn!(err = %e.message, code = ?e.code, "registry refresh failed"),
        }
    }

    /// Spawn the polling loop. Cancels cleanly via `cancel`, per the
    /// concurrency model's "Polling Driver cancels any in-flight refresh
    /// when its owner is torn down" (spec.md §5).
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut visible_rx = self.gates.visible.subscribe();
            let mut online_rx = self.gates.online.subscribe();

            if self.gates.active() {
                self.refresh_once().await;
            }

            loop {
                if !self.gates.active() {
                    // Hidden or offline: stop the ticker and wait for a
                    // gate change rather than busy-waiting the tick.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = visible_rx.changed() => {},
                        _ = online_rx.changed() => {},
                    }
                    if self.gates.active() {
                        self.refresh_once().await;
                    }
                    continue;
                }

                let tick = Duration::from_millis(self.base_tick_ms + self.connection.poll_backoff_ms());
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = visible_rx.changed() => continue,
                    _ = online_rx.changed() => continue,
                    _ = tokio::time::sleep(tick) => {
                        if self.gates.active() {
                            self.refresh_once().await;
                        }
                    }
                }
            }
        });
    }

    /// Issue one refresh immediately on resume from hidden/offline, per
    /// spec.md §4.10, regardless of the regular tick.
    pub async fn refresh_on_resume(&self) {
        self.refresh_once().await;
    }

    /// Clear the auth-block and trigger a refresh, per spec.md §4.8's
    /// `reconnect()` contract.
    pub async fn reconnect(&self) {
        self.connection.reconnect();
        self.refresh_once().await;
    }
}

#[cfg(test)]
#[path = "polling_tests.rs"]
mod tests;
