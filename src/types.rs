//! Core types for crowntalk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized key referencing one unit of source content (a post URL)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Identifier(pub String);

impl Identifier {
    /// Create a new Identifier (no normalization is applied)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identifier together with its position in the deduplicated sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Zero-based position in processing order
    pub position: usize,
    /// The identifier to process
    pub identifier: Identifier,
}

/// Source content returned by the content fetcher
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Content {
    /// Post text
    pub text: String,
    /// Display name of the author
    pub author: String,
}

/// Generated result for one identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Payload {
    /// Author of the source post
    pub author: String,
    /// Generated comments, exactly as many as the constraints require
    pub comments: Vec<String>,
}

/// Why an item failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Content missing, private, deleted, or the retrieval service never answered
    FetchUnavailable,
    /// The generator kept rate limiting until the attempts ran out
    GenerationRateLimited,
    /// The generator kept failing transiently until the attempts ran out
    GenerationTransient,
    /// The generator rejected the request outright
    GenerationPermanent,
    /// The run was abandoned before this item finished
    Cancelled,
}

impl FailureKind {
    /// Stable snake_case name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::FetchUnavailable => "fetch_unavailable",
            FailureKind::GenerationRateLimited => "generation_rate_limited",
            FailureKind::GenerationTransient => "generation_transient",
            FailureKind::GenerationPermanent => "generation_permanent",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classification plus the last error message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailureReason {
    /// Failure category
    pub kind: FailureKind,
    /// Last error reported by the collaborator
    pub message: String,
}

/// Per-identifier result of the fetch + generate pipeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Generation succeeded
    Success {
        /// Generated payload
        payload: Payload,
    },
    /// The item failed after the retry policy gave up
    Failure {
        /// Why it failed
        reason: FailureReason,
        /// Whether resubmitting the item later could succeed
        retriable: bool,
    },
}

impl Outcome {
    /// Returns true for `Outcome::Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Failure kind, if this outcome is a failure
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { reason, .. } => Some(reason.kind),
        }
    }
}

/// An outcome attributed to its identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemOutcome {
    /// The identifier this outcome belongs to
    pub identifier: Identifier,
    /// The outcome
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Emitted after each chunk of a run completes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchEvent {
    /// 1-based index of the chunk that just completed
    pub chunk_index: usize,
    /// Total number of chunks in the run
    pub total_chunks: usize,
    /// Outcomes of this chunk, in processing order
    pub outcomes: Vec<ItemOutcome>,
    /// Pause that follows this chunk (absent after the last chunk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<f64>,
}

impl BatchEvent {
    /// Number of failed items in this chunk
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_success())
            .count()
    }
}

/// Run status as seen by progress readers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run has started yet
    #[default]
    Idle,
    /// A run is in flight
    Running,
    /// The last run attempted every chunk
    Complete,
    /// The last run was abandoned by its caller
    Cancelled,
}

/// Read-only projection of the current run's progress
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    /// Run status
    pub status: RunStatus,
    /// Number of chunks completed so far
    pub current_batch: usize,
    /// Total number of chunks in the run
    pub total_batches: usize,
    /// Percentage of chunks completed, rounded to one decimal
    pub percent_done: f64,
    /// Estimated seconds remaining
    pub eta_seconds: f64,
    /// When the current (or last) run started
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Event broadcast to subscribers during a run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run was accepted and scheduled
    RunStarted {
        /// Number of unique identifiers
        total_identifiers: usize,
        /// Number of chunks
        total_chunks: usize,
        /// Identifiers dropped as duplicates
        duplicates: Vec<String>,
    },

    /// One chunk finished
    ChunkCompleted(BatchEvent),

    /// The run attempted every chunk
    RunCompleted {
        /// Number of succeeded identifiers
        succeeded: usize,
        /// Number of failed identifiers
        failed: usize,
        /// Wall-clock duration of the run
        elapsed_seconds: f64,
    },

    /// The run was abandoned before completing
    RunCancelled {
        /// Chunks completed before cancellation
        completed_chunks: usize,
    },

    /// The keep-alive ping failed
    KeepAliveFailed {
        /// Error message
        error: String,
    },
}

impl Event {
    /// SSE event name for this event
    pub fn name(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run_started",
            Event::ChunkCompleted(_) => "chunk_completed",
            Event::RunCompleted { .. } => "run_completed",
            Event::RunCancelled { .. } => "run_cancelled",
            Event::KeepAliveFailed { .. } => "keep_alive_failed",
        }
    }
}
