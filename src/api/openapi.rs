//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the crowntalk REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the crowntalk REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "crowntalk REST API",
        version = "0.3.1",
        description = "Batch comment generation for social posts: deduplicates URLs, fetches each post and generates short replies in paced chunks",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:10000", description = "Local development server")
    ),
    paths(
        // Comments
        crate::api::routes::create_comments,
        crate::api::routes::stream_comments,

        // System
        crate::api::routes::root,
        crate::api::routes::health_check,
        crate::api::routes::get_progress,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::Identifier,
        crate::types::Content,
        crate::types::Payload,
        crate::types::FailureKind,
        crate::types::FailureReason,
        crate::types::Outcome,
        crate::types::ItemOutcome,
        crate::types::BatchEvent,
        crate::types::RunStatus,
        crate::types::ProgressSnapshot,

        // Run results
        crate::report::Report,
        crate::report::SucceededItem,
        crate::report::FailedItem,
        crate::batch::RunSummary,

        // Config types from config.rs
        crate::config::Config,
        crate::config::BatchConfig,
        crate::config::RetryConfig,
        crate::config::FetcherConfig,
        crate::config::GeneratorConfig,
        crate::config::GenerationConstraints,
        crate::config::ApiConfig,
        crate::config::KeepAliveConfig,

        // API request types from routes
        crate::api::routes::CommentRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "comments", description = "Batch comment generation - blocking or streamed per chunk"),
        (name = "system", description = "System endpoints - Liveness, health, progress, events, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
