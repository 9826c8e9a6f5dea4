use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::connection::ConnectionState;
use crate::coordinator::RequestCoordinator;
use crate::registry::Registry;
use crate::test_support::AnyhowExt;
use crate::upstream::client::UpstreamClient;

#[test]
fn gates_default_to_active() {
    let gates = PollingGates::default();
    assert!(gates.active());
}

#[test]
fn gates_inactive_when_hidden_or_offline() {
    let gates = PollingGates::default();
    gates.set_visible(false);
    assert!(!gates.active());
    gates.set_visible(true);
    assert!(gates.active());
    gates.set_online(false);
    assert!(!gates.active());
}

async fn spawn_fake_upstream_with_counter() -> anyhow::Result<(String, Arc<AtomicUsize>)> {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_handler = Arc::clone(&calls);
    let app = Router::new().route(
        "/sessions",
        get(move || {
            let calls = Arc::clone(&calls_handler);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(serde_json::json!({"sessions": []}))
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.anyhow()?;
    let addr = listener.local_addr().anyhow()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((format!("http://{addr}"), calls))
}

#[tokio::test]
async fn spawn_refreshes_once_immediately_when_active() -> anyhow::Result<()> {
    let (base_url, calls) = spawn_fake_upstream_with_counter().await?;
    let client = UpstreamClient::new(base_url, None);
    let connection = Arc::new(ConnectionState::new(false));
    let registry = Arc::new(Registry::new());
    let coordinator =
        Arc::new(RequestCoordinator::new(client, Arc::clone(&connection), Arc::clone(&registry), Duration::from_millis(200)));
    let gates = Arc::new(PollingGates::default());
    let driver = Arc::new(PollingDriver::new(coordinator, registry, connection, Arc::clone(&gates), DEFAULT_BASE_TICK_MS));

    let cancel = CancellationToken::new();
    driver.spawn(cancel.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(calls.load(Ordering::SeqCst) >= 1);
    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn resume_issues_an_immediate_refresh() -> anyhow::Result<()> {
    let (base_url, calls) = spawn_fake_upstream_with_counter().await?;
    let client = UpstreamClient::new(base_url, None);
    let connection = Arc::new(ConnectionState::new(false));
    let registry = Arc::new(Registry::new());
    let coordinator =
        Arc::new(RequestCoordinator::new(client, Arc::clone(&connection), Arc::clone(&registry), Duration::from_millis(200)));
    let gates = Arc::new(PollingGates::default());
    let driver = PollingDriver::new(coordinator, registry, connection, gates, DEFAULT_BASE_TICK_MS);

    let before = calls.load(Ordering::SeqCst);
    driver.refresh_on_resume().await;
    assert!(calls.load(Ordering::SeqCst) > before);
    Ok(())
}

#[tokio::test]
async fn reconnect_clears_auth_block_and_refreshes() -> anyhow::Result<()> {
    let (base_url, calls) = spawn_fake_upstream_with_counter().await?;
    let client = UpstreamClient::new(base_url, None);
    let connection = Arc::new(ConnectionState::new(true));
    connection.apply(crate::connection::RefreshResult {
        ok: false,
        status: Some(401),
        auth_error: true,
        rate_limited: false,
    });
    assert_eq!(connection.status(), crate::connection::ConnectionStatus::Disconnected);

    let registry = Arc::new(Registry::new());
    let coordinator = Arc::new(RequestCoordinator::new(
        client,
        Arc::clone(&connection),
        Arc::clone(&registry),
        Duration::from_millis(200),
    ));
    let gates = Arc::new(PollingGates::default());
    let driver = PollingDriver::new(coordinator, registry, Arc::clone(&connection), gates, DEFAULT_BASE_TICK_MS);

    let before = calls.load(Ordering::SeqCst);
    driver.reconnect().await;
    assert!(calls.load(Ordering::SeqCst) > before);
    assert_ne!(connection.status(), crate::connection::ConnectionStatus::Disconnected);
    Ok(())
}
