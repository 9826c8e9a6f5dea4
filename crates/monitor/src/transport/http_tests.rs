use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::AppState;
use crate::test_support::{AnyhowExt, AnyhowOptExt};
use crate::transport::build_router;

async fn spawn_fake_upstream(app: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await.anyhow()?;
    let addr = listener.local_addr().anyhow()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(format!("http://{addr}"))
}

fn test_config(upstream_url: String, auth_token: Option<String>) -> Config {
    Config {
        host: "127.0.0.1".to_owned(),
        port: 0,
        auth_token,
        upstream_url,
        upstream_token: None,
        retention_ms: timeline::store::DEFAULT_RETENTION_MS,
        max_items_per_pane: timeline::store::DEFAULT_MAX_ITEMS_PER_PANE,
        poll_ms: 60_000,
        mutation_timeout_ms: 200,
    }
}

#[tokio::test]
async fn health_is_reachable_without_auth() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), Some("secret".to_owned()));
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/api/v1/health").await;
    resp.assert_status(StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn other_routes_require_bearer_auth_when_configured() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), Some("secret".to_owned()));
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/sessions").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server.get("/sessions").authorization_bearer("secret").await;
    resp.assert_status(StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn list_sessions_reflects_registry_state() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    state
        .registry
        .update(crate::registry::SessionSummary {
            pane_id: "p1".to_owned(),
            session_name: "s".to_owned(),
            state: "RUNNING".to_owned(),
            agent: "claude".to_owned(),
            repo_root: None,
            branch: None,
            worktree_path: None,
            custom_title: None,
            title: None,
            last_input_at: None,
            pane_dead: false,
            extra: serde_json::Map::new(),
        })
        .await;
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/sessions").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["sessions"][0]["paneId"], "p1");
    Ok(())
}

#[tokio::test]
async fn screen_rejects_empty_pane_id() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.post("/sessions//screen").json(&serde_json::json!({"mode": "text"})).await;
    assert_ne!(resp.status_code(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn screen_rejects_unknown_mode() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.post("/sessions/p1/screen").json(&serde_json::json!({"mode": "smell"})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "INVALID_PAYLOAD");
    Ok(())
}

#[tokio::test]
async fn screen_proxies_to_upstream_and_wraps_envelope() -> anyhow::Result<()> {
    let upstream =
        Router::new().route("/sessions/{pane_id}/screen", post(|| async { Json(serde_json::json!({"lines": ["hello"]})) }));
    let base_url = spawn_fake_upstream(upstream).await?;
    let config = test_config(base_url, None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.post("/sessions/p1/screen").json(&serde_json::json!({"mode": "text"})).await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["screen"]["ok"], true);
    assert_eq!(body["screen"]["paneId"], "p1");
    Ok(())
}

#[tokio::test]
async fn timeline_pane_scope_returns_empty_history() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/sessions/p1/timeline?scope=pane&range=1h").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["paneId"], "p1");
    assert_eq!(body["items"].as_array().anyhow("items array")?.len(), 0);
    Ok(())
}

#[tokio::test]
async fn timeline_rejects_unknown_range() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/sessions/p1/timeline?scope=pane&range=9y").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn timeline_repo_scope_requires_known_pane() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.get("/sessions/p1/timeline?scope=repo").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn launch_rejects_cwd_and_worktree_together() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server
        .post("/sessions/launch")
        .json(&serde_json::json!({
            "sessionName": "s",
            "agent": "claude",
            "requestId": "r1",
            "cwd": "/tmp",
            "worktreePath": "/tmp/wt",
        }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn launch_rejects_create_if_missing_without_branch() -> anyhow::Result<()> {
    let config = test_config("http://127.0.0.1:1".to_owned(), None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server
        .post("/sessions/launch")
        .json(&serde_json::json!({
            "sessionName": "s",
            "agent": "claude",
            "requestId": "r1",
            "worktreePath": "/tmp/wt",
            "worktreeCreateIfMissing": true,
        }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn launch_forwards_to_upstream_on_success() -> anyhow::Result<()> {
    let upstream = Router::new().route("/sessions/launch", post(|| async { Json(serde_json::json!({"paneId": "p-new"})) }));
    let base_url = spawn_fake_upstream(upstream).await?;
    let config = test_config(base_url, None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server
        .post("/sessions/launch")
        .json(&serde_json::json!({
            "sessionName": "s",
            "agent": "claude",
            "requestId": "r1",
        }))
        .await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["paneId"], "p-new");
    Ok(())
}

#[tokio::test]
async fn touch_command_never_throws_on_upstream_failure() -> anyhow::Result<()> {
    let upstream = Router::new().route("/sessions/{pane_id}/touch", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let base_url = spawn_fake_upstream(upstream).await?;
    let config = test_config(base_url, None);
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = axum_test::TestServer::new(build_router(state)).anyhow()?;

    let resp = server.post("/sessions/p1/touch").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["ok"], false);
    Ok(())
}
