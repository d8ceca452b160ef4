//! Per-item pipeline: fetch content, then generate, each under the retry policy

use crate::config::GenerationConstraints;
use crate::error::{FetchError, GenerationError};
use crate::fetcher::ContentFetcher;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::types::{FailureKind, FailureReason, ItemOutcome, Outcome, Payload, WorkItem};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Turns one work item into exactly one outcome
///
/// Collaborator errors are converted to [`Outcome::Failure`] here and never
/// propagate further.
#[derive(Clone)]
pub struct ItemPipeline {
    fetcher: Arc<dyn ContentFetcher>,
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    constraints: GenerationConstraints,
}

impl ItemPipeline {
    /// Create a pipeline over the given collaborators
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        generator: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
        constraints: GenerationConstraints,
    ) -> Self {
        Self {
            fetcher,
            generator,
            retry,
            constraints,
        }
    }

    /// Process one item
    pub async fn process(&self, item: &WorkItem, cancel: &CancellationToken) -> ItemOutcome {
        let identifier = item.identifier.clone();

        if cancel.is_cancelled() {
            return ItemOutcome {
                identifier,
                outcome: cancelled_outcome("run cancelled before item started"),
            };
        }

        let content = match self
            .retry
            .execute(cancel, || self.fetcher.fetch(&identifier))
            .await
        {
            Ok(content) => content,
            Err(failure) => {
                tracing::info!(
                    identifier = %identifier,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Content unavailable"
                );
                return ItemOutcome {
                    identifier,
                    outcome: fetch_failure(failure),
                };
            }
        };

        let author = content.author.clone();
        let request = GenerationRequest {
            content,
            constraints: self.constraints,
        };

        let outcome = match self
            .retry
            .execute(cancel, || self.generator.generate(&request))
            .await
        {
            Ok(comments) => Outcome::Success {
                payload: Payload { author, comments },
            },
            Err(failure) => {
                tracing::info!(
                    identifier = %identifier,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Generation failed"
                );
                generation_failure(failure)
            }
        };

        ItemOutcome {
            identifier,
            outcome,
        }
    }
}

fn cancelled_outcome(message: impl Into<String>) -> Outcome {
    Outcome::Failure {
        reason: FailureReason {
            kind: FailureKind::Cancelled,
            message: message.into(),
        },
        retriable: true,
    }
}

fn fetch_failure(failure: RetryFailure<FetchError>) -> Outcome {
    if failure.cancelled {
        return cancelled_outcome(failure.error.to_string());
    }
    Outcome::Failure {
        reason: FailureReason {
            kind: FailureKind::FetchUnavailable,
            message: failure.error.to_string(),
        },
        retriable: failure.retriable,
    }
}

fn generation_failure(failure: RetryFailure<GenerationError>) -> Outcome {
    if failure.cancelled {
        return cancelled_outcome(failure.error.to_string());
    }
    let kind = match failure.error {
        GenerationError::RateLimited(_) => FailureKind::GenerationRateLimited,
        GenerationError::Transient(_) => FailureKind::GenerationTransient,
        GenerationError::Permanent(_) => FailureKind::GenerationPermanent,
    };
    Outcome::Failure {
        reason: FailureReason {
            kind,
            message: failure.error.to_string(),
        },
        retriable: failure.retriable,
    }
}
