use std::sync::Arc;

use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;

use super::build_router;
use crate::config::Config;
use crate::state::AppState;
use crate::test_support::{AnyhowExt, AnyhowOptExt};

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_owned(),
        port: 0,
        auth_token: None,
        upstream_url: "http://127.0.0.1:1".to_owned(),
        upstream_token: None,
        retention_ms: timeline::store::DEFAULT_RETENTION_MS,
        max_items_per_pane: timeline::store::DEFAULT_MAX_ITEMS_PER_PANE,
        poll_ms: 60_000,
        mutation_timeout_ms: 200,
    }
}

#[tokio::test]
async fn unknown_route_is_404() -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(test_config(), CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/not-a-route").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn cors_is_permissive() -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(test_config(), CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/api/v1/health").add_header("origin", "http://example.com").await;
    resp.assert_status(StatusCode::OK);
    resp.headers().get("access-control-allow-origin").anyhow("cors header present")?;
    Ok(())
}
