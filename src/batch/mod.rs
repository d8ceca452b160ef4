//! Batch orchestration split into focused submodules.
//!
//! - [`pipeline`] - Per-item fetch then generate, each under the retry policy
//! - [`cooldown`] - Inter-chunk pause sizing
//! - [`scheduler`] - Chunking, pacing and the lazy [`BatchRun`]
//!
//! [`BatchRunner`] is the entry point: it validates and deduplicates the raw
//! input, starts a scheduler run and broadcasts run events to subscribers.

pub mod cooldown;
pub mod pipeline;
pub mod scheduler;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use cooldown::CooldownPolicy;
pub use pipeline::ItemPipeline;
pub use scheduler::{BatchRun, BatchScheduler, partition};

use crate::config::Config;
use crate::dedupe::dedupe;
use crate::error::{Error, Result};
use crate::fetcher::{ContentFetcher, VxTwitterFetcher};
use crate::generator::{OpenAiGenerator, TextGenerator};
use crate::keepalive::KeepAlive;
use crate::progress::ProgressTracker;
use crate::report::{Report, render_summary};
use crate::retry::RetryPolicy;
use crate::types::{BatchEvent, Event, Identifier, ProgressSnapshot, RunStatus};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

/// Per-invocation overrides
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Chunk size for this run (defaults to `batch.chunk_size`)
    pub chunk_size: Option<usize>,
}

/// Final result of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    /// Aggregated outcomes
    #[serde(flatten)]
    pub report: Report,
    /// Identifiers dropped as duplicates of earlier entries
    pub duplicates: Vec<Identifier>,
    /// Wall-clock duration of the run
    pub elapsed_seconds: f64,
    /// One-line human-readable summary
    pub summary: String,
    /// `complete`, or `cancelled` if the run was abandoned
    pub status: RunStatus,
}

/// Item of [`ActiveRun::into_updates`]
#[derive(Clone, Debug, PartialEq)]
pub enum RunUpdate {
    /// A chunk finished
    Chunk(BatchEvent),
    /// The run ended; always the last item
    Finished(RunSummary),
}

/// Orchestrates batch runs (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BatchRunner {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    scheduler: BatchScheduler,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Parent of every run's cancellation token
    shutdown: CancellationToken,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Create a runner with the HTTP fetcher and generator built from `config`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid or no generator
    /// API key is set.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher: Arc<dyn ContentFetcher> = Arc::new(VxTwitterFetcher::new(&config.fetcher)?);
        let generator: Arc<dyn TextGenerator> =
            Arc::new(OpenAiGenerator::new(&config.generator)?);

        tracing::info!(
            fetcher = %config.fetcher.api_base,
            generator = %config.generator.base_url,
            model = %config.generator.model,
            "Batch runner initialized"
        );

        Self::with_collaborators(config, fetcher, generator)
    }

    /// Create a runner over caller-supplied collaborators
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid.
    pub fn with_collaborators(
        config: Config,
        fetcher: Arc<dyn ContentFetcher>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        config.validate()?;

        let pipeline = ItemPipeline::new(
            fetcher,
            generator,
            RetryPolicy::from_config(&config.retry),
            config.generator.constraints,
        );
        let scheduler = BatchScheduler::new(
            pipeline,
            CooldownPolicy::from_config(&config.batch),
            config.batch.item_concurrency,
            ProgressTracker::new(),
        );

        // Buffer generously so slow SSE subscribers rarely lag
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            scheduler,
            event_tx,
            shutdown: CancellationToken::new(),
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Non-blocking snapshot of the current (or last) run's progress
    pub fn progress(&self) -> ProgressSnapshot {
        self.scheduler.progress().snapshot()
    }

    /// Token cancelled by [`BatchRunner::shutdown`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel any active run and stop background tasks tied to this runner
    pub fn shutdown(&self) {
        tracing::info!("Initiating shutdown");
        self.shutdown.cancel();
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() fails only when nobody is listening
        self.event_tx.send(event).ok();
    }

    /// Spawn the keep-alive pinger if `keep_alive.url` is configured
    ///
    /// The pinger stops when [`BatchRunner::shutdown`] is called.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn spawn_keep_alive(&self) -> Result<Option<tokio::task::JoinHandle<()>>> {
        let pinger = KeepAlive::from_config(&self.config.keep_alive, self.event_tx.clone())?;
        Ok(pinger.map(|pinger| tokio::spawn(pinger.run(self.shutdown.clone()))))
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let runner = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(runner, config).await })
    }

    /// Validate the raw input and start a run
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for empty, oversized or all-blank input, or a
    ///   zero chunk size
    /// - [`Error::RunInProgress`] if another run is still running
    pub fn start<I, S>(&self, raw: I, options: RunOptions) -> Result<ActiveRun>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<S> = raw.into_iter().collect();
        let max = self.config.batch.max_identifiers;

        if raw.is_empty() {
            return Err(Error::InvalidInput("no urls provided".to_string()));
        }
        if raw.len() > max {
            return Err(Error::InvalidInput(format!(
                "too many urls: {} (maximum {})",
                raw.len(),
                max
            )));
        }

        let chunk_size = options.chunk_size.unwrap_or(self.config.batch.chunk_size);
        if chunk_size == 0 {
            return Err(Error::InvalidInput(
                "chunk_size must be at least 1".to_string(),
            ));
        }

        let deduplicated = dedupe(raw.iter().map(|entry| entry.as_ref()));
        if deduplicated.unique.is_empty() {
            return Err(Error::InvalidInput("all urls are blank".to_string()));
        }

        let total_identifiers = deduplicated.unique.len();
        let run = self.scheduler.run(
            deduplicated.unique,
            chunk_size,
            self.shutdown.child_token(),
        )?;

        if !deduplicated.duplicates.is_empty() {
            tracing::debug!(
                duplicates = deduplicated.duplicates.len(),
                "Dropped duplicate urls"
            );
        }

        self.emit_event(Event::RunStarted {
            total_identifiers,
            total_chunks: run.total_chunks(),
            duplicates: deduplicated
                .duplicates
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
        });

        Ok(ActiveRun {
            run,
            duplicates: deduplicated.duplicates,
            event_tx: self.event_tx.clone(),
            announced: false,
        })
    }

    /// Run a batch to completion and return its summary
    ///
    /// # Errors
    ///
    /// Same as [`BatchRunner::start`]; item failures are part of the summary.
    pub async fn process<I, S>(&self, raw: I, options: RunOptions) -> Result<RunSummary>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let run = self.start(raw, options)?;
        Ok(run.finish().await)
    }

    /// Start a run and return its updates as a stream
    ///
    /// Dropping the stream before it ends cancels the run.
    ///
    /// # Errors
    ///
    /// Same as [`BatchRunner::start`].
    pub fn stream(
        &self,
        raw: Vec<String>,
        options: RunOptions,
    ) -> Result<impl Stream<Item = RunUpdate> + Send + use<>> {
        Ok(self.start(raw, options)?.into_updates())
    }
}

/// A started run that broadcasts its progress
///
/// Dropping an unfinished `ActiveRun` cancels the run and broadcasts
/// [`Event::RunCancelled`]. Dropping one whose chunks have all been pulled
/// broadcasts [`Event::RunCompleted`] instead.
pub struct ActiveRun {
    run: BatchRun,
    duplicates: Vec<Identifier>,
    event_tx: broadcast::Sender<Event>,
    announced: bool,
}

impl ActiveRun {
    /// Process the next chunk, broadcasting its event
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        let event = self.run.next_event().await?;
        self.event_tx
            .send(Event::ChunkCompleted(event.clone()))
            .ok();
        Some(event)
    }

    /// Drive the remaining chunks and return the summary
    pub async fn finish(mut self) -> RunSummary {
        while self.next_event().await.is_some() {}
        self.summarize()
    }

    /// Convert into a stream of chunk updates followed by one final summary
    pub fn into_updates(self) -> impl Stream<Item = RunUpdate> + Send + use<> {
        stream::unfold(Some(self), |state| async move {
            let mut active = state?;
            match active.next_event().await {
                Some(event) => Some((RunUpdate::Chunk(event), Some(active))),
                None => Some((RunUpdate::Finished(active.summarize()), None)),
            }
        })
    }

    /// Identifiers dropped as duplicates
    pub fn duplicates(&self) -> &[Identifier] {
        &self.duplicates
    }

    /// Total number of chunks in this run
    pub fn total_chunks(&self) -> usize {
        self.run.total_chunks()
    }

    /// Request cancellation; the run stops before its next chunk
    pub fn cancel(&self) {
        self.run.cancel();
    }

    fn summarize(&mut self) -> RunSummary {
        let report = self.run.report();
        let elapsed = self.run.elapsed();
        let status = self.run.status();

        let event = if status == RunStatus::Cancelled {
            Event::RunCancelled {
                completed_chunks: self.run.completed_chunks(),
            }
        } else {
            Event::RunCompleted {
                succeeded: report.succeeded.len(),
                failed: report.failed.len(),
                elapsed_seconds: elapsed.as_secs_f64(),
            }
        };
        if !self.announced {
            self.event_tx.send(event).ok();
            self.announced = true;
        }

        let summary = render_summary(&report, elapsed);
        tracing::info!(status = ?status, "{}", summary);

        RunSummary {
            report,
            duplicates: self.duplicates.clone(),
            elapsed_seconds: elapsed.as_secs_f64(),
            summary,
            status,
        }
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if self.announced {
            return;
        }
        if self.run.status() == RunStatus::Running {
            self.run.cancel();
            self.event_tx
                .send(Event::RunCancelled {
                    completed_chunks: self.run.completed_chunks(),
                })
                .ok();
            self.announced = true;
        } else {
            // Driven to its end without `finish`: announce the real outcome
            self.summarize();
        }
    }
}
