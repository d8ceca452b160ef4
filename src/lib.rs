//! # crowntalk
//!
//! Batch comment generation for social posts.
//!
//! A run takes a list of post URLs, deduplicates them, then walks them in
//! small chunks: each URL's post is fetched and a short set of replies is
//! generated for it. Chunks are separated by a cooldown that grows when the
//! generation service starts rate limiting, and every external call is
//! retried with exponential backoff. Item failures never abort a run; they
//! are reported next to the successes.
//!
//! ## Design Philosophy
//!
//! - **Sensible defaults** - Works out of the box with an API key and nothing else
//! - **Pluggable collaborators** - Content retrieval and text generation sit behind traits
//! - **Event-driven** - Consumers subscribe to run events or poll a progress snapshot
//! - **One run at a time** - A second run is rejected while one is in flight
//!
//! ## Quick Start
//!
//! ```no_run
//! use crowntalk::{BatchRunner, Config, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.apply_env()?;
//!
//!     let runner = BatchRunner::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = runner
//!         .process(vec!["https://x.com/someone/status/1"], RunOptions::default())
//!         .await?;
//!     println!("{}", summary.summary);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Batch orchestration (pipeline, scheduler, runner)
pub mod batch;
/// Configuration types
pub mod config;
/// Identifier normalization and deduplication
pub mod dedupe;
/// Error types
pub mod error;
/// Content retrieval
pub mod fetcher;
/// Text generation
pub mod generator;
/// Keep-alive pinger
pub mod keepalive;
/// Run progress tracking
pub mod progress;
/// Result aggregation
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types
pub mod types;

// Re-export commonly used types
pub use batch::{ActiveRun, BatchRunner, RunOptions, RunSummary, RunUpdate};
pub use config::{Config, GenerationConstraints};
pub use error::{Error, FetchError, GenerationError, Result};
pub use fetcher::{ContentFetcher, VxTwitterFetcher};
pub use generator::{GenerationRequest, OpenAiGenerator, TextGenerator};
pub use progress::ProgressTracker;
pub use report::{Report, aggregate, render_summary};
pub use types::{
    BatchEvent, Content, Event, FailureKind, FailureReason, Identifier, ItemOutcome, Outcome,
    Payload, ProgressSnapshot, RunStatus,
};

/// Helper function to run the batch runner with graceful signal handling.
///
/// Waits for a termination signal and then calls the runner's `shutdown()` method,
/// which cancels any active run and stops the API server and keep-alive pinger.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use crowntalk::{BatchRunner, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let runner = BatchRunner::new(config)?;
///     let server = runner.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(&runner).await?;
///     server.await??;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(runner: &BatchRunner) -> Result<()> {
    wait_for_signal().await;
    runner.shutdown();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
