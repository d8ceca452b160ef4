//! Inter-chunk cooldown sizing

use crate::config::BatchConfig;
use crate::types::FailureKind;
use std::time::Duration;

/// Pause between chunks, extended after a chunk ran into the generator's rate limit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Pause after a chunk without rate-limited failures
    pub base: Duration,
    /// Pause after a chunk with at least one rate-limited failure
    pub rate_limited: Duration,
}

impl CooldownPolicy {
    /// Build from batch configuration
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            base: config.base_cooldown,
            rate_limited: config.rate_limited_cooldown,
        }
    }

    /// Pause to apply after a chunk with the given failures
    pub fn compute<I>(&self, failures: I) -> Duration
    where
        I: IntoIterator<Item = FailureKind>,
    {
        let rate_limited = failures
            .into_iter()
            .any(|kind| kind == FailureKind::GenerationRateLimited);

        if rate_limited {
            // never shorter than the base pause
            self.rate_limited.max(self.base)
        } else {
            self.base
        }
    }
}
