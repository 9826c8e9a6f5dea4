// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AppState`: the composition root tying the Timeline Store (C5), the
//! Session Registry (C9), the Connection State Machine (C8), and the
//! Request Coordinator (C7) to one HTTP process.
//!
//! Grounded on `coopmux::state::MuxState`'s single-struct-of-shared-state
//! shape: one `Arc<AppState>` handed to every axum handler and background
//! task, with the Timeline Store behind a single `RwLock` per the
//! concurrency model's "single mutex per store instance" allowance
//! (spec.md §5).

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use timeline::{Clock, SystemClock, TimelineStore};

use crate::config::Config;
use crate::connection::ConnectionState;
use crate::coordinator::RequestCoordinator;
use crate::polling::PollingGates;
use crate::registry::Registry;
use crate::upstream::client::UpstreamClient;

pub struct AppState {
    pub config: Config,
    pub shutdown: CancellationToken,
    pub timeline: RwLock<TimelineStore>,
    pub registry: Arc<Registry>,
    pub connection: Arc<ConnectionState>,
    pub coordinator: Arc<RequestCoordinator>,
    pub polling_gates: Arc<PollingGates>,
}

impl AppState {
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self::with_clock(config, shutdown, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, shutdown: CancellationToken, clock: Arc<dyn Clock>) -> Self {
        let timeline = TimelineStore::new(clock, config.retention_ms, config.max_items_per_pane);
        let registry = Arc::new(Registry::new());
        let connection = Arc::new(ConnectionState::new(config.upstream_token.is_some()));
        let client = UpstreamClient::new(config.upstream_url.clone(), config.upstream_token.clone());
        let coordinator = Arc::new(RequestCoordinator::new(
            client,
            Arc::clone(&connection),
            Arc::clone(&registry),
            config.mutation_timeout(),
        ));

        Self {
            config,
            shutdown,
            timeline: RwLock::new(timeline),
            registry,
            connection,
            coordinator,
            polling_gates: Arc::new(PollingGates::default()),
        }
    }
}

/// Return current epoch millis, used at the HTTP boundary for
/// `capturedAt`/`now` fields the timeline crate doesn't itself format.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
