//! Retry logic with class-aware exponential backoff
//!
//! Every call to an external collaborator goes through [`RetryPolicy::execute`].
//! Errors are classified through the [`Retryable`] trait:
//!
//! - [`ErrorClass::RateLimited`] backs off from `rate_limit_delay`, doubling per attempt
//! - [`ErrorClass::Transient`] backs off from `initial_delay` by `backoff_multiplier`
//! - [`ErrorClass::Permanent`] aborts immediately
//!
//! Delays are capped at `max_delay` and, when jitter is enabled, stretched by a
//! random 0-100% so concurrent items don't retry in lockstep. Exhaustion never
//! panics or propagates: it yields a [`RetryFailure`] describing the last error.
//!
//! # Example
//!
//! ```no_run
//! use crowntalk::config::RetryConfig;
//! use crowntalk::retry::{ErrorClass, RetryPolicy, Retryable};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct Busy;
//!
//! impl std::fmt::Display for Busy {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "busy")
//!     }
//! }
//!
//! impl Retryable for Busy {
//!     fn error_class(&self) -> ErrorClass {
//!         ErrorClass::Transient
//!     }
//! }
//!
//! # async fn example() {
//! let policy = RetryPolicy::from_config(&RetryConfig::default());
//! let cancel = CancellationToken::new();
//! let result = policy
//!     .execute(&cancel, || async { Ok::<_, Busy>("done") })
//!     .await;
//! assert!(result.is_ok());
//! # }
//! ```

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How an error should influence retrying
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote side is throttling us; wait longer before retrying
    RateLimited,
    /// Temporary failure; retry after a short backoff
    Transient,
    /// Retrying cannot help
    Permanent,
}

/// Trait for errors that can be classified for retrying
pub trait Retryable {
    /// Classify this error
    fn error_class(&self) -> ErrorClass;

    /// Returns true unless the error is permanent
    fn is_retryable(&self) -> bool {
        self.error_class() != ErrorClass::Permanent
    }
}

/// Delay policy between attempts, as a function of attempt number and error class
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffStrategy {
    /// Base delay for transient errors
    pub initial_delay: Duration,
    /// Base delay for rate-limited errors
    pub rate_limit_delay: Duration,
    /// Upper bound for any computed delay (before jitter)
    pub max_delay: Duration,
    /// Growth factor per attempt for transient errors
    pub backoff_multiplier: f64,
    /// Add random jitter to every delay
    pub jitter: bool,
}

impl BackoffStrategy {
    /// Delay before the next attempt, without jitter
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    /// Returns `None` for permanent errors.
    pub fn base_delay(&self, attempt: u32, class: ErrorClass) -> Option<Duration> {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let (base, factor) = match class {
            ErrorClass::Permanent => return None,
            ErrorClass::RateLimited => (self.rate_limit_delay, 2f64.powi(exponent)),
            ErrorClass::Transient => (self.initial_delay, self.backoff_multiplier.powi(exponent)),
        };

        let secs = (base.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Some(Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay))
    }

    /// Delay before the next attempt, with jitter applied when enabled
    pub fn delay(&self, attempt: u32, class: ErrorClass) -> Option<Duration> {
        self.base_delay(attempt, class).map(|delay| {
            if self.jitter {
                add_jitter(delay)
            } else {
                delay
            }
        })
    }
}

impl From<&RetryConfig> for BackoffStrategy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: config.initial_delay,
            rate_limit_delay: config.rate_limit_delay,
            max_delay: config.max_delay,
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

/// The operation did not succeed within the allowed attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    /// The last error returned by the operation
    pub error: E,
    /// How many times the operation was attempted
    pub attempts: u32,
    /// False only when the last error was permanent
    pub retriable: bool,
    /// Retrying stopped because the run was cancelled
    pub cancelled: bool,
}

/// Bounded retries around a single fallible async operation
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one (values below 1 count as 1)
    pub max_attempts: u32,
    /// Delay policy between attempts
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Build a policy from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, BackoffStrategy::from(config))
    }

    /// Execute an async operation, retrying according to the error class
    ///
    /// The backoff sleep suspends only the calling task and is raced against
    /// `cancel`; a cancelled wait ends retrying with the last error.
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            let class = error.error_class();
            let retriable = class != ErrorClass::Permanent;

            if !retriable {
                tracing::warn!(error = %error, "Operation failed with non-retryable error");
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    retriable,
                    cancelled: false,
                });
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    error = %error,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    retriable,
                    cancelled: false,
                });
            }

            let delay = self
                .backoff
                .delay(attempt, class)
                .unwrap_or(self.backoff.initial_delay);

            tracing::debug!(
                error = %error,
                attempt = attempt,
                max_attempts = max_attempts,
                class = ?class,
                delay_ms = delay.as_millis() as u64,
                "Operation failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(attempts = attempt, "Retry cancelled during backoff");
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                        retriable,
                        cancelled: true,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Add random jitter to a delay to prevent synchronized retries
///
/// The actual delay will be between `delay` and `2 * delay`, saturating at
/// `Duration::MAX`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::try_from_secs_f64(jittered_secs).unwrap_or(Duration::MAX)
}
