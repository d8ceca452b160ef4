//! Comment generation handlers.

use super::CommentRequest;
use crate::api::AppState;
use crate::batch::RunUpdate;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use std::convert::Infallible;

/// POST /comment - Generate comments for a batch of URLs
///
/// Blocks until every chunk has been processed. Dropping the connection
/// cancels the run.
#[utoipa::path(
    post,
    path = "/comment",
    tag = "comments",
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Run finished", body = crate::batch::RunSummary),
        (status = 400, description = "Empty, oversized or blank input", body = crate::error::ApiError),
        (status = 409, description = "Another run is in progress", body = crate::error::ApiError)
    )
)]
pub async fn create_comments(
    State(state): State<AppState>,
    Json(request): Json<CommentRequest>,
) -> Response {
    let options = request.options();
    match state.runner.process(request.urls, options).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Comment request rejected");
            e.into_response()
        }
    }
}

/// POST /comment/stream - Generate comments, streaming one event per chunk
///
/// Emits a `chunk` event (BatchEvent JSON) after each chunk and a final `done`
/// event (RunSummary JSON). Closing the stream cancels the run.
#[utoipa::path(
    post,
    path = "/comment/stream",
    tag = "comments",
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 400, description = "Empty, oversized or blank input", body = crate::error::ApiError),
        (status = 409, description = "Another run is in progress", body = crate::error::ApiError)
    )
)]
pub async fn stream_comments(
    State(state): State<AppState>,
    Json(request): Json<CommentRequest>,
) -> Response {
    let options = request.options();
    let updates = match state.runner.stream(request.urls, options) {
        Ok(updates) => updates,
        Err(e) => {
            tracing::warn!(error = %e, "Comment stream request rejected");
            return e.into_response();
        }
    };

    let sse_stream = updates.map(|update| {
        let event = match &update {
            RunUpdate::Chunk(event) => SseEvent::default().event("chunk").json_data(event),
            RunUpdate::Finished(summary) => SseEvent::default().event("done").json_data(summary),
        };
        Ok::<_, Infallible>(event.unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize run update to JSON: {}", e);
            SseEvent::default()
                .event("error")
                .data(r#"{"error":"serialization_failed"}"#)
        }))
    });

    Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
