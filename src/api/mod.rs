//! REST API server module
//!
//! Exposes batch comment generation over HTTP, plus progress polling and a
//! server-sent events feed of run events.

use crate::{BatchRunner, Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Comments
/// - `POST /comment` - Run a batch and return the summary
/// - `POST /comment/stream` - Run a batch, streaming one SSE event per chunk
///
/// ## System
/// - `GET /` - Liveness probe
/// - `GET /health` - Health check
/// - `GET /progress` - Progress of the current (or last) run
/// - `GET /events` - Server-sent events stream
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(runner: BatchRunner, config: Arc<Config>) -> Router {
    let state = AppState::new(runner, config.clone());

    let router = Router::new()
        // Comments
        .route("/comment", post(routes::create_comments))
        .route("/comment/stream", post(routes::stream_comments))
        // System
        .route("/", get(routes::root))
        .route("/health", get(routes::health_check))
        .route("/progress", get(routes::get_progress))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Merge Swagger UI routes if enabled in config (before applying state)
    // SwaggerUi serves its own copy of the document under /api-docs
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config (outermost)
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin; otherwise only the listed
/// origins are allowed. All methods and headers are permitted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Runs until the server stops with an error or the runner is shut down.
///
/// # Example
///
/// ```no_run
/// use crowntalk::{BatchRunner, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let runner = BatchRunner::new(config.clone())?;
///
/// // Start API server (blocks until shutdown)
/// crowntalk::api::start_api_server(runner, Arc::new(config)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(runner: BatchRunner, config: Arc<Config>) -> Result<()> {
    let shutdown = runner.shutdown_token();
    serve(runner, config, async move { shutdown.cancelled().await }).await
}

/// Start the API server and stop gracefully when `shutdown` resolves
pub async fn serve<F>(runner: BatchRunner, config: Arc<Config>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(runner, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
