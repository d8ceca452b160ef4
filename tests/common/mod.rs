//! Shared fixtures for integration tests: mock lookup and generation services

#![allow(dead_code)]

use crowntalk::{Config, Event};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{body_string_contains, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two generated lines that satisfy the default output contract
pub const GOOD_COMPLETION: &str =
    "Great point about shipping early today\nThis release looks genuinely exciting for everyone";

/// Mock servers standing in for the post lookup API and the chat completions API
pub struct MockServices {
    /// vxtwitter-style lookup API
    pub lookup: MockServer,
    /// OpenAI-compatible chat API
    pub llm: MockServer,
}

impl MockServices {
    /// Start both servers with catch-all success responses
    pub async fn start() -> Self {
        let lookup = MockServer::start().await;
        let llm = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/x\.com/[^/]+/status/\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "shipping the new release today",
                "user_name": "Someone"
            })))
            .with_priority(10)
            .mount(&lookup)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(completion(GOOD_COMPLETION))
            .with_priority(10)
            .mount(&llm)
            .await;

        Self { lookup, llm }
    }

    /// Make the lookup for `post_path` (e.g. `/x.com/a/status/1`) answer with `status`
    pub async fn lookup_status(&self, post_path: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(post_path))
            .respond_with(ResponseTemplate::new(status))
            .with_priority(1)
            .mount(&self.lookup)
            .await;
    }

    /// Serve `text` for `post_path`
    pub async fn lookup_text(&self, post_path: &str, text: &str) {
        Mock::given(method("GET"))
            .and(path(post_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": text,
                "user_name": "Someone"
            })))
            .with_priority(1)
            .mount(&self.lookup)
            .await;
    }

    /// Make generation requests whose prompt contains `needle` answer with `status`
    pub async fn llm_status_for(&self, needle: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "error": { "message": format!("HTTP {status} from mock") }
            })))
            .with_priority(1)
            .mount(&self.llm)
            .await;
    }

    /// Config pointing at the mock servers with millisecond-scale pacing
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.fetcher.api_base = self.lookup.uri();
        config.fetcher.timeout = Duration::from_secs(2);
        config.generator.base_url = self.llm.uri();
        config.generator.api_key = Some("test-key".to_string());
        config.generator.timeout = Duration::from_secs(2);
        config.retry.initial_delay = Duration::from_millis(1);
        config.retry.rate_limit_delay = Duration::from_millis(1);
        config.retry.max_delay = Duration::from_millis(5);
        config.retry.jitter = false;
        config.batch.base_cooldown = Duration::from_millis(10);
        config.batch.rate_limited_cooldown = Duration::from_millis(50);
        config
    }
}

/// Chat completions response carrying `content`
pub fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

/// Post URL for a numbered test post
pub fn post_url(n: usize) -> String {
    format!("https://x.com/user{n}/status/{n}")
}

/// Lookup path for a numbered test post
pub fn post_path(n: usize) -> String {
    format!("/x.com/user{n}/status/{n}")
}

/// Drain every event currently buffered in `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
