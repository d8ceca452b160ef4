//! Application state for the API server

use crate::{BatchRunner, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// The batch runner serving comment requests
    pub runner: BatchRunner,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(runner: BatchRunner, config: Arc<Config>) -> Self {
        Self { runner, config }
    }
}
