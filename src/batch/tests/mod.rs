use super::test_helpers::*;
use super::*;
use crate::error::{FetchError, GenerationError};
use crate::types::{Content, FailureKind, Outcome};
use std::time::Duration;


fn scheduler_for(
    config: &Config,
    fetcher: Arc<ScriptedFetcher>,
    generator: Arc<ScriptedGenerator>,
) -> BatchScheduler {
    let pipeline = ItemPipeline::new(
        fetcher,
        generator,
        RetryPolicy::from_config(&config.retry),
        config.generator.constraints,
    );
    BatchScheduler::new(
        pipeline,
        CooldownPolicy::from_config(&config.batch),
        config.batch.item_concurrency,
        ProgressTracker::new(),
    )
}

fn runner_for(
    config: Config,
    fetcher: Arc<ScriptedFetcher>,
    generator: Arc<ScriptedGenerator>,
) -> BatchRunner {
    BatchRunner::with_collaborators(config, fetcher, generator).unwrap()
}

fn identifiers(n: usize) -> Vec<Identifier> {
    (0..n).map(|i| Identifier::new(url(i))).collect()
}
