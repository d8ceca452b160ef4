//! Chunked batch execution with inter-chunk cooldown
//!
//! [`BatchScheduler::run`] partitions identifiers into chunks and returns a
//! [`BatchRun`]. Nothing is processed until the caller pulls events from the
//! run: each [`BatchRun::next_event`] call waits out the cooldown owed by the
//! previous chunk, processes the next chunk and returns its [`BatchEvent`].
//!
//! Item failures never end a run. A run ends either when every chunk has been
//! attempted (`complete`) or when its cancellation token fires or it is dropped
//! (`cancelled`).

use super::cooldown::CooldownPolicy;
use super::pipeline::ItemPipeline;
use crate::error::Result;
use crate::progress::{ProgressTracker, RunGuard};
use crate::report::{Report, aggregate};
use crate::types::{BatchEvent, Identifier, ItemOutcome, RunStatus, WorkItem};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Partition identifiers into chunks of `chunk_size` (the last may be shorter)
///
/// A `chunk_size` of zero is treated as one.
pub fn partition(identifiers: Vec<Identifier>, chunk_size: usize) -> Vec<Vec<WorkItem>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks: Vec<Vec<WorkItem>> = Vec::with_capacity(identifiers.len().div_ceil(chunk_size));

    for (position, identifier) in identifiers.into_iter().enumerate() {
        if position % chunk_size == 0 {
            chunks.push(Vec::with_capacity(chunk_size));
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(WorkItem {
                position,
                identifier,
            });
        }
    }

    chunks
}

/// Drives batch runs over an [`ItemPipeline`]
#[derive(Clone)]
pub struct BatchScheduler {
    pipeline: Arc<ItemPipeline>,
    cooldown: CooldownPolicy,
    item_concurrency: usize,
    progress: ProgressTracker,
}

impl BatchScheduler {
    /// Create a scheduler
    ///
    /// `item_concurrency` bounds how many items of one chunk are in flight at
    /// once; 1 processes items sequentially.
    pub fn new(
        pipeline: ItemPipeline,
        cooldown: CooldownPolicy,
        item_concurrency: usize,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            cooldown,
            item_concurrency: item_concurrency.max(1),
            progress,
        }
    }

    /// The tracker this scheduler reports to
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Start a run over already-deduplicated identifiers
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RunInProgress`] if another run is still running.
    pub fn run(
        &self,
        identifiers: Vec<Identifier>,
        chunk_size: usize,
        cancel: CancellationToken,
    ) -> Result<BatchRun> {
        let chunk_size = chunk_size.max(1);
        let chunks = partition(identifiers, chunk_size);
        let total_chunks = chunks.len();

        let mut guard = self.progress.begin(total_chunks, chunk_size)?;

        let status = if total_chunks == 0 {
            guard.complete();
            RunStatus::Complete
        } else {
            RunStatus::Running
        };

        tracing::info!(
            total_chunks,
            chunk_size,
            item_concurrency = self.item_concurrency,
            "Batch run started"
        );

        Ok(BatchRun {
            pipeline: self.pipeline.clone(),
            cooldown: self.cooldown,
            item_concurrency: self.item_concurrency,
            chunks,
            next_chunk: 0,
            total_chunks,
            outcomes: Vec::new(),
            items_done: 0,
            pending_cooldown: None,
            started: Instant::now(),
            status,
            cancel,
            guard,
        })
    }
}

/// One in-flight batch run
///
/// Not restartable: once every chunk has been attempted, or the run has been
/// cancelled, `next_event` keeps returning `None`.
pub struct BatchRun {
    pipeline: Arc<ItemPipeline>,
    cooldown: CooldownPolicy,
    item_concurrency: usize,
    chunks: Vec<Vec<WorkItem>>,
    next_chunk: usize,
    total_chunks: usize,
    outcomes: Vec<ItemOutcome>,
    items_done: usize,
    pending_cooldown: Option<Duration>,
    started: Instant,
    status: RunStatus,
    cancel: CancellationToken,
    guard: RunGuard,
}

impl BatchRun {
    /// Process the next chunk and return its event
    ///
    /// Returns `None` once the run is complete or cancelled.
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        if self.status != RunStatus::Running {
            return None;
        }

        if self.cancel.is_cancelled() {
            self.mark_cancelled();
            return None;
        }

        if let Some(delay) = self.pending_cooldown.take() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Cooling down before next chunk");
            let cancel = self.cancel.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.mark_cancelled();
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let index = self.next_chunk;
        let chunk = std::mem::take(&mut self.chunks[index]);
        let outcomes = self.process_chunk(chunk).await;

        self.next_chunk += 1;
        self.items_done += outcomes.len();

        let avg_seconds_per_item = if self.items_done == 0 {
            0.0
        } else {
            self.started.elapsed().as_secs_f64() / self.items_done as f64
        };
        self.guard
            .advance(self.next_chunk, self.total_chunks, avg_seconds_per_item);

        let is_last = self.next_chunk == self.total_chunks;
        let cooldown = if is_last {
            None
        } else {
            Some(
                self.cooldown
                    .compute(outcomes.iter().filter_map(|o| o.outcome.failure_kind())),
            )
        };
        self.pending_cooldown = cooldown;

        let event = BatchEvent {
            chunk_index: self.next_chunk,
            total_chunks: self.total_chunks,
            outcomes,
            cooldown_seconds: cooldown.map(|d| d.as_secs_f64()),
        };

        tracing::info!(
            chunk = event.chunk_index,
            total_chunks = event.total_chunks,
            failed = event.failed_count(),
            "Chunk completed"
        );

        self.outcomes.extend(event.outcomes.iter().cloned());

        if self.cancel.is_cancelled() {
            self.mark_cancelled();
        } else if is_last {
            self.status = RunStatus::Complete;
            self.guard.complete();
            tracing::info!(
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Batch run complete"
            );
        }

        Some(event)
    }

    async fn process_chunk(&self, chunk: Vec<WorkItem>) -> Vec<ItemOutcome> {
        let pipeline = &self.pipeline;
        let cancel = &self.cancel;

        if self.item_concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(chunk.len());
            for item in &chunk {
                outcomes.push(pipeline.process(item, cancel).await);
            }
            return outcomes;
        }

        let mut results: Vec<(usize, ItemOutcome)> = stream::iter(chunk)
            .map(|item| async move {
                let outcome = pipeline.process(&item, cancel).await;
                (item.position, outcome)
            })
            .buffer_unordered(self.item_concurrency)
            .collect()
            .await;

        results.sort_by_key(|(position, _)| *position);
        results.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn mark_cancelled(&mut self) {
        if self.status == RunStatus::Running {
            tracing::info!(
                completed_chunks = self.next_chunk,
                total_chunks = self.total_chunks,
                "Batch run cancelled"
            );
        }
        self.status = RunStatus::Cancelled;
        self.guard.cancel();
    }

    /// Drive the run to its end, discarding events
    pub async fn run_to_completion(&mut self) {
        while self.next_event().await.is_some() {}
    }

    /// Convert the run into a stream of chunk events
    pub fn into_stream(self) -> impl Stream<Item = BatchEvent> + Send {
        stream::unfold(self, |mut run| async move {
            run.next_event().await.map(|event| (event, run))
        })
    }

    /// Request cancellation; no further chunks are scheduled
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancellation token of this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current status of this run
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Number of chunks completed so far
    pub fn completed_chunks(&self) -> usize {
        self.next_chunk
    }

    /// Total number of chunks
    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Outcomes recorded so far, in processing order
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Aggregate the outcomes recorded so far
    pub fn report(&self) -> Report {
        aggregate(self.outcomes.iter().cloned())
    }
}
