//! Content retrieval
//!
//! [`ContentFetcher`] is the seam between the batch engine and whatever service
//! resolves an identifier to its source text. [`VxTwitterFetcher`] is the HTTP
//! implementation used in production: it maps a post URL onto a vxtwitter-style
//! JSON lookup API.
//!
//! Every failure is reported as "content unavailable"; the variant only tells
//! the retry policy whether another attempt could help.

use crate::config::FetcherConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{Content, Identifier};
use async_trait::async_trait;
use serde::Deserialize;

/// Resolves an identifier to its source content
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the content behind `identifier`
    ///
    /// Implementations must bound their own latency: a hung request is reported
    /// as [`FetchError::Unreachable`], never as an indefinite wait.
    async fn fetch(&self, identifier: &Identifier) -> std::result::Result<Content, FetchError>;
}

/// HTTP fetcher for vxtwitter-compatible lookup APIs
#[derive(Debug, Clone)]
pub struct VxTwitterFetcher {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    text: Option<String>,
    user_name: Option<String>,
    user_screen_name: Option<String>,
    tweet: Option<NestedPost>,
}

#[derive(Debug, Deserialize)]
struct NestedPost {
    text: Option<String>,
    author: Option<NestedAuthor>,
}

#[derive(Debug, Deserialize)]
struct NestedAuthor {
    name: Option<String>,
    screen_name: Option<String>,
}

impl LookupResponse {
    fn into_content(self) -> Option<Content> {
        let nested_text = self.tweet.as_ref().and_then(|t| t.text.clone());
        let text = self
            .text
            .or(nested_text)
            .filter(|t| !t.trim().is_empty())?;

        let nested_author = self.tweet.and_then(|t| t.author);
        let author = self
            .user_name
            .or(self.user_screen_name)
            .or_else(|| {
                nested_author.and_then(|a| a.name.or(a.screen_name))
            })
            .unwrap_or_default();

        Some(Content { text, author })
    }
}

impl VxTwitterFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("crowntalk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Lookup URL for a post URL: the API base followed by host and path
    pub fn lookup_url(&self, identifier: &Identifier) -> std::result::Result<String, FetchError> {
        let parsed = url::Url::parse(identifier.as_str())
            .map_err(|e| FetchError::Unavailable(format!("invalid URL '{identifier}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::Unavailable(format!("URL '{identifier}' has no host")))?;

        Ok(format!("{}/{}{}", self.api_base, host, parsed.path()))
    }
}

fn classify_transport_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        FetchError::Unreachable(e.to_string())
    } else {
        FetchError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl ContentFetcher for VxTwitterFetcher {
    async fn fetch(&self, identifier: &Identifier) -> std::result::Result<Content, FetchError> {
        let url = self.lookup_url(identifier)?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Unreachable(format!("lookup returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!("lookup returned HTTP {}", status)));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Unavailable(format!("unexpected lookup response: {e}")))?;

        body.into_content()
            .ok_or_else(|| FetchError::Unavailable("post has no text".to_string()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer) -> VxTwitterFetcher {
        VxTwitterFetcher::new(&FetcherConfig {
            api_base: format!("{}/", server.uri()),
            timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_url_strips_scheme() {
        let fetcher = VxTwitterFetcher::new(&FetcherConfig::default()).unwrap();
        let url = fetcher
            .lookup_url(&Identifier::from("https://x.com/alice/status/123"))
            .unwrap();
        assert_eq!(url, "https://api.vxtwitter.com/x.com/alice/status/123");
    }

    #[tokio::test]
    async fn test_invalid_identifier_is_unavailable() {
        let fetcher = VxTwitterFetcher::new(&FetcherConfig::default()).unwrap();
        let err = fetcher
            .fetch(&Identifier::from("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_flat_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x.com/alice/status/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "shipping the new release today",
                "user_name": "Alice",
                "user_screen_name": "alice"
            })))
            .mount(&server)
            .await;

        let content = fetcher_for(&server)
            .fetch(&Identifier::from("https://x.com/alice/status/1"))
            .await
            .unwrap();
        assert_eq!(content.text, "shipping the new release today");
        assert_eq!(content.author, "Alice");
    }

    #[tokio::test]
    async fn test_nested_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x.com/bob/status/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tweet": { "text": "gm", "author": { "screen_name": "bob" } }
            })))
            .mount(&server)
            .await;

        let content = fetcher_for(&server)
            .fetch(&Identifier::from("https://x.com/bob/status/2"))
            .await
            .unwrap();
        assert_eq!(content.text, "gm");
        assert_eq!(content.author, "bob");
    }

    #[tokio::test]
    async fn test_missing_text_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_name": "ghost"
            })))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch(&Identifier::from("https://x.com/ghost/status/3"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch(&Identifier::from("https://x.com/deleted/status/4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch(&Identifier::from("https://x.com/busy/status/5"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_hang_times_out_as_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(serde_json::json!({ "text": "late" })),
            )
            .mount(&server)
            .await;

        let start = std::time::Instant::now();
        let err = fetcher_for(&server)
            .fetch(&Identifier::from("https://x.com/slow/status/6"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unreachable(_)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
