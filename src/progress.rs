//! Process-wide progress tracking for batch runs
//!
//! A single [`ProgressTracker`] is shared by the scheduler (the only writer) and
//! any number of pollers (readers). Only one run may be in flight at a time:
//! [`ProgressTracker::begin`] rejects a second run while the first is running,
//! rather than letting two runs overwrite each other's counters.

use crate::error::{Error, Result};
use crate::types::{ProgressSnapshot, RunStatus};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct ProgressState {
    run_id: u64,
    status: RunStatus,
    current_batch: usize,
    total_batches: usize,
    chunk_size: usize,
    avg_seconds_per_item: f64,
    started_at: Option<DateTime<Utc>>,
}

/// Shared, cheaply cloneable progress state
#[derive(Clone, Debug, Default)]
pub struct ProgressTracker {
    state: Arc<RwLock<ProgressState>>,
    next_run_id: Arc<AtomicU64>,
}

impl ProgressTracker {
    /// Create an idle tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new run, overwriting the previous run's state
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunInProgress`] while another run is running.
    pub fn begin(&self, total_batches: usize, chunk_size: usize) -> Result<RunGuard> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.status == RunStatus::Running {
            return Err(Error::RunInProgress);
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst) + 1;
        *state = ProgressState {
            run_id,
            status: RunStatus::Running,
            current_batch: 0,
            total_batches,
            chunk_size,
            avg_seconds_per_item: 0.0,
            started_at: Some(Utc::now()),
        };

        Ok(RunGuard {
            tracker: self.clone(),
            run_id,
            finished: false,
        })
    }

    fn advance(
        &self,
        run_id: u64,
        chunk_index: usize,
        total_chunks: usize,
        avg_seconds_per_item: f64,
    ) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.run_id != run_id || state.status != RunStatus::Running {
            return;
        }
        state.current_batch = chunk_index;
        state.total_batches = total_chunks;
        state.avg_seconds_per_item = avg_seconds_per_item;
    }

    /// Non-blocking read of the current progress
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let percent_done = if state.total_batches == 0 {
            if state.status == RunStatus::Complete {
                100.0
            } else {
                0.0
            }
        } else {
            round_one_decimal(state.current_batch as f64 / state.total_batches as f64 * 100.0)
        };

        let eta_seconds = match state.status {
            RunStatus::Running => {
                let remaining = state.total_batches.saturating_sub(state.current_batch);
                remaining as f64 * state.chunk_size as f64 * state.avg_seconds_per_item
            }
            _ => 0.0,
        };

        ProgressSnapshot {
            status: state.status,
            current_batch: state.current_batch,
            total_batches: state.total_batches,
            percent_done,
            eta_seconds,
            started_at: state.started_at,
        }
    }

    /// Current run status
    pub fn status(&self) -> RunStatus {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    fn finish(&self, run_id: u64, status: RunStatus) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.run_id != run_id || state.status != RunStatus::Running {
            return;
        }
        state.status = status;
        if status == RunStatus::Complete {
            state.current_batch = state.total_batches;
        }
    }
}

/// Ownership of the running slot in a [`ProgressTracker`]
///
/// Dropping the guard without calling [`RunGuard::complete`] marks the run
/// cancelled, so an abandoned run never leaves the tracker stuck in `running`.
#[derive(Debug)]
pub struct RunGuard {
    tracker: ProgressTracker,
    run_id: u64,
    finished: bool,
}

impl RunGuard {
    /// Forward a chunk completion to the tracker
    pub fn advance(&self, chunk_index: usize, total_chunks: usize, avg_seconds_per_item: f64) {
        self.tracker
            .advance(self.run_id, chunk_index, total_chunks, avg_seconds_per_item);
    }

    /// Mark the run complete
    pub fn complete(&mut self) {
        self.tracker.finish(self.run_id, RunStatus::Complete);
        self.finished = true;
    }

    /// Mark the run cancelled
    pub fn cancel(&mut self) {
        self.tracker.finish(self.run_id, RunStatus::Cancelled);
        self.finished = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.finish(self.run_id, RunStatus::Cancelled);
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
