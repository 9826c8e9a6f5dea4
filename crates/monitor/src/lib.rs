// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-pane agent-session monitor: fronts a [`timeline::TimelineStore`]
//! and a thin session registry with an HTTP API, a Request Coordinator
//! (dedup, timeouts, envelope translation) and a Polling Driver.

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod pane_id;
pub mod polling;
pub mod registry;
pub mod state;
#[cfg(test)]
pub mod test_support;
pub mod transport;
pub mod upstream;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::polling::PollingDriver;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the monitor process until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState::new(config, shutdown.clone()));

    let driver = Arc::new(PollingDriver::new(
        Arc::clone(&state.coordinator),
        Arc::clone(&state.registry),
        Arc::clone(&state.connection),
        Arc::clone(&state.polling_gates),
        state.config.poll_ms,
    ));
    driver.spawn(shutdown.child_token());

    tracing::info!("monitor listening on {addr}");
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
