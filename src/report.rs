//! Result aggregation and summary rendering

use crate::types::{FailureReason, Identifier, ItemOutcome, Outcome, Payload};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

/// A successfully processed identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SucceededItem {
    /// The identifier
    pub identifier: Identifier,
    /// Generated payload
    pub payload: Payload,
}

/// Failure detail for a failed identifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailedItem {
    /// The identifier
    pub identifier: Identifier,
    /// Why it failed
    pub reason: FailureReason,
    /// Whether resubmitting later could succeed
    pub retriable: bool,
}

/// Final partition of a run's outcomes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Report {
    /// Succeeded identifiers with their payloads, in processing order
    pub succeeded: Vec<SucceededItem>,
    /// Failed identifiers, in processing order
    pub failed: Vec<Identifier>,
    /// Failure details, parallel to `failed`
    pub failures: Vec<FailedItem>,
}

impl Report {
    /// Total number of identifiers in the report
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True if the report holds no outcomes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition outcomes by tag, keeping their order
pub fn aggregate<I>(outcomes: I) -> Report
where
    I: IntoIterator<Item = ItemOutcome>,
{
    let mut report = Report::default();

    for ItemOutcome {
        identifier,
        outcome,
    } in outcomes
    {
        match outcome {
            Outcome::Success { payload } => {
                report.succeeded.push(SucceededItem {
                    identifier,
                    payload,
                });
            }
            Outcome::Failure { reason, retriable } => {
                report.failed.push(identifier.clone());
                report.failures.push(FailedItem {
                    identifier,
                    reason,
                    retriable,
                });
            }
        }
    }

    report
}

/// Human-readable one-line summary of a report
pub fn render_summary(report: &Report, elapsed: Duration) -> String {
    format!(
        "{} succeeded, {} failed in {:.1}s",
        report.succeeded.len(),
        report.failed.len(),
        elapsed.as_secs_f64()
    )
}
