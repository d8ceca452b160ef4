//! Scripted collaborators and fast configs for batch tests.

use crate::config::Config;
use crate::error::{FetchError, GenerationError};
use crate::fetcher::ContentFetcher;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::types::{Content, Identifier};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Config with millisecond-scale retry delays and cooldowns
pub(crate) fn fast_config() -> Config {
    let mut config = Config::default();
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.rate_limit_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config.batch.base_cooldown = Duration::from_millis(10);
    config.batch.rate_limited_cooldown = Duration::from_millis(60);
    config
}

pub(crate) fn url(n: usize) -> String {
    format!("https://x.com/user{n}/status/{n}")
}

/// Fetcher returning scripted results per identifier, then a default success
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Result<Content, FetchError>>>>,
    pub(crate) calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue a result for the next fetch of `identifier`
    pub(crate) fn script(&self, identifier: &str, result: Result<Content, FetchError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(identifier.to_string())
            .or_default()
            .push_back(result);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn text_for(identifier: &str) -> String {
    format!("post text behind {identifier}")
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, identifier: &Identifier) -> Result<Content, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(identifier.as_str())
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| {
            Ok(Content {
                text: text_for(identifier.as_str()),
                author: format!("author of {identifier}"),
            })
        })
    }
}

/// Generator returning scripted results per source text, then a default success
///
/// Tracks the texts it was asked about and the peak number of concurrent calls.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<Vec<String>, GenerationError>>>>,
    seen: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub(crate) peak_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue a result for the next generation over `text`
    pub(crate) fn script(&self, text: &str, result: Result<Vec<String>, GenerationError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(text.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue the same error `times` times
    pub(crate) fn script_failures(&self, text: &str, error: GenerationError, times: usize) {
        for _ in 0..times {
            self.script(text, Err(error.clone()));
        }
    }

    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

pub(crate) fn comments_for(text: &str) -> Vec<String> {
    vec![
        format!("first thought on {text}"),
        format!("second thought on {text}"),
    ]
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, GenerationError> {
        let text = request.content.text.clone();
        self.seen.lock().unwrap().push(text.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&text)
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| Ok(comments_for(&text)))
    }
}
