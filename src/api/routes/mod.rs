//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`comments`] - Batch comment generation (blocking and streamed)
//! - [`system`] - Liveness, health, progress, events, OpenAPI

use serde::{Deserialize, Serialize};

mod comments;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use comments::*;
pub use system::*;

// ============================================================================
// Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /comment and POST /comment/stream
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CommentRequest {
    /// Post URLs to comment on; duplicates and query strings are dropped
    #[serde(default)]
    pub urls: Vec<String>,
    /// Override the configured chunk size for this run
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl CommentRequest {
    pub(crate) fn options(&self) -> crate::RunOptions {
        crate::RunOptions {
            chunk_size: self.chunk_size,
        }
    }
}
