//! End-to-end batch runs against mocked lookup and generation services
//!
//! These tests drive [`BatchRunner::new`] with the real HTTP collaborators, so
//! every request goes through reqwest to a local wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{GOOD_COMPLETION, MockServices, drain_events, post_path, post_url};
use crowntalk::{BatchRunner, Config, Event, FailureKind, RunOptions, RunStatus, RunUpdate};
use futures::StreamExt;
use std::io::Write;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_full_run_generates_comments_for_unique_posts() {
    let services = MockServices::start().await;
    let runner = assert_ok!(BatchRunner::new(services.config()));

    let urls = vec![post_url(1), post_url(2), post_url(1), post_url(3)];
    let summary = assert_ok!(runner.process(urls, RunOptions::default()).await);

    assert_eq!(summary.status, RunStatus::Complete);
    assert_eq!(summary.report.succeeded.len(), 3);
    assert!(summary.report.failed.is_empty());
    assert_eq!(summary.duplicates.len(), 1);
    assert_eq!(summary.duplicates[0].as_str(), post_url(1));

    let expected: Vec<String> = GOOD_COMPLETION.lines().map(str::to_string).collect();
    for item in &summary.report.succeeded {
        assert_eq!(item.payload.comments, expected);
        assert_eq!(item.payload.author, "Someone");
    }

    let order: Vec<&str> = summary
        .report
        .succeeded
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(order, vec![post_url(1), post_url(2), post_url(3)]);
}

#[tokio::test]
async fn test_missing_post_fails_without_generation() {
    let services = MockServices::start().await;
    services.lookup_status(&post_path(2), 404).await;
    services.lookup_text(&post_path(3), "a post nobody else wrote").await;

    // A missing post must never reach the generator
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::body_string_contains("user2"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(0)
        .mount(&services.llm)
        .await;

    let runner = assert_ok!(BatchRunner::new(services.config()));
    let summary = assert_ok!(
        runner
            .process(vec![post_url(1), post_url(2), post_url(3)], RunOptions::default())
            .await
    );

    assert_eq!(summary.report.succeeded.len(), 2);
    assert_eq!(summary.report.failed.len(), 1);
    assert_eq!(summary.report.failed[0].as_str(), post_url(2));

    let failure = &summary.report.failures[0];
    assert_eq!(failure.reason.kind, FailureKind::FetchUnavailable);
    assert!(!failure.retriable);
}

#[tokio::test]
async fn test_rate_limited_generation_exhausts_retries() {
    let services = MockServices::start().await;
    services.lookup_text(&post_path(1), "a very busy post").await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::body_string_contains("a very busy post"))
        .respond_with(ResponseTemplate::new(429))
        .with_priority(1)
        .expect(4)
        .mount(&services.llm)
        .await;

    let mut config = services.config();
    config.retry.max_attempts = 4;
    let runner = assert_ok!(BatchRunner::new(config));
    let mut events = runner.subscribe();

    let summary = assert_ok!(
        runner
            .process(vec![post_url(1), post_url(2)], RunOptions { chunk_size: Some(1) })
            .await
    );

    assert_eq!(summary.report.succeeded.len(), 1);
    assert_eq!(summary.report.failures.len(), 1);
    assert_eq!(
        summary.report.failures[0].reason.kind,
        FailureKind::GenerationRateLimited
    );
    assert!(summary.report.failures[0].retriable);

    // The chunk that hit the rate limit is followed by the longer cooldown
    let chunks: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            Event::ChunkCompleted(chunk) => Some(chunk),
            _ => None,
        })
        .collect();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].cooldown_seconds, Some(0.05));
    assert_eq!(chunks[1].cooldown_seconds, None);
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let services = MockServices::start().await;
    services.lookup_text(&post_path(1), "flaky upstream post").await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::body_string_contains("flaky upstream post"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .up_to_n_times(2)
        .expect(2)
        .mount(&services.llm)
        .await;

    let runner = assert_ok!(BatchRunner::new(services.config()));
    let summary = assert_ok!(runner.process(vec![post_url(1)], RunOptions::default()).await);

    assert_eq!(summary.report.succeeded.len(), 1);
    assert!(summary.report.failed.is_empty());
}

#[tokio::test]
async fn test_streamed_run_reports_every_chunk() {
    let services = MockServices::start().await;
    let runner = assert_ok!(BatchRunner::new(services.config()));

    let urls: Vec<String> = (1..=5).map(post_url).collect();
    let stream = assert_ok!(runner.stream(urls, RunOptions { chunk_size: Some(2) }));
    let updates: Vec<RunUpdate> = stream.collect().await;

    assert_eq!(updates.len(), 4);
    let sizes: Vec<usize> = updates
        .iter()
        .filter_map(|update| match update {
            RunUpdate::Chunk(chunk) => Some(chunk.outcomes.len()),
            RunUpdate::Finished(_) => None,
        })
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    match updates.last() {
        Some(RunUpdate::Finished(summary)) => {
            assert_eq!(summary.report.succeeded.len(), 5);
            assert_eq!(summary.status, RunStatus::Complete);
        }
        other => panic!("expected a final summary, got {other:?}"),
    }

    let progress = runner.progress();
    assert_eq!(progress.status, RunStatus::Complete);
    assert_eq!(progress.percent_done, 100.0);
}

#[tokio::test]
async fn test_runner_requires_api_key() {
    let services = MockServices::start().await;
    let mut config = services.config();
    config.generator.api_key = None;

    assert_err!(BatchRunner::new(config));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_any_lookup() {
    let services = MockServices::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(1)
        .expect(0)
        .mount(&services.lookup)
        .await;

    let runner = assert_ok!(BatchRunner::new(services.config()));

    assert_err!(runner.process(Vec::<String>::new(), RunOptions::default()).await);
    assert_err!(
        runner
            .process(vec![post_url(1)], RunOptions { chunk_size: Some(0) })
            .await
    );
    assert_err!(runner.process(vec!["   ".to_string()], RunOptions::default()).await);
}

#[tokio::test]
async fn test_config_file_with_env_overrides() {
    let services = MockServices::start().await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "batch": {{ "chunk_size": 3, "base_cooldown": 0.01 }},
            "retry": {{ "max_attempts": 2, "initial_delay": 0.001, "jitter": false }},
            "fetcher": {{ "api_base": "{}" }}
        }}"#,
        services.lookup.uri()
    )
    .unwrap();

    let mut config = assert_ok!(Config::from_file(file.path()));
    assert_eq!(config.batch.chunk_size, 3);
    assert_eq!(config.retry.max_attempts, 2);
    assert!((config.batch.base_cooldown.as_secs_f64() - 0.01).abs() < 1e-9);

    let llm_uri = services.llm.uri();
    assert_ok!(config.apply_env_from(|key| match key {
        "OPENAI_API_KEY" => Some("from-env".to_string()),
        "OPENAI_BASE_URL" => Some(llm_uri.clone()),
        "PORT" => Some("18080".to_string()),
        _ => None,
    }));
    assert_eq!(config.generator.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.api.bind_address.port(), 18080);

    let runner = assert_ok!(BatchRunner::new(config));
    let summary = assert_ok!(
        runner
            .process((1..=4).map(post_url), RunOptions::default())
            .await
    );
    assert_eq!(summary.report.succeeded.len(), 4);
}

#[tokio::test]
async fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert_err!(Config::from_file(dir.path().join("absent.json")));
}
