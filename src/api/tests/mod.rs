use super::*;
use crate::batch::test_helpers::{ScriptedFetcher, ScriptedGenerator, fast_config, url};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use std::time::Duration;
use tower::ServiceExt;


/// Runner over scripted collaborators plus the config it was built from
fn create_test_runner(config: Config) -> (BatchRunner, Arc<Config>) {
    let runner = BatchRunner::with_collaborators(
        config.clone(),
        Arc::new(ScriptedFetcher::new()),
        Arc::new(ScriptedGenerator::new()),
    )
    .unwrap();
    (runner, Arc::new(config))
}

fn test_app() -> (Router, BatchRunner) {
    let (runner, config) = create_test_runner(fast_config());
    (create_router(runner.clone(), config), runner)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown() {
    let mut config = fast_config();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let (runner, config) = create_test_runner(config);

    let api_handle = tokio::spawn({
        let runner = runner.clone();
        async move { start_api_server(runner, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    runner.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let mut config = fast_config();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let (runner, _config) = create_test_runner(config);

    let api_handle = runner.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _runner) = test_app();

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = fast_config();
    config.api.cors_enabled = false;
    let (runner, config) = create_test_runner(config);
    let app = create_router(runner, config);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let mut config = fast_config();
    config.api.swagger_ui = true;
    let (runner, config) = create_test_runner(config);
    let app = create_router(runner, config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
