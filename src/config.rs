//! Configuration types for crowntalk
//!
//! Every tuning knob that differed between deployments of this service (chunk
//! size, cooldowns, retry budget, output constraints) is a configuration value
//! with a default rather than a constant.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};
use utoipa::ToSchema;

/// Batch scheduling configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchConfig {
    /// Number of identifiers processed per chunk (default: 2)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum number of identifiers accepted per invocation (default: 30)
    #[serde(default = "default_max_identifiers")]
    pub max_identifiers: usize,

    /// Identifiers processed concurrently within a chunk (default: 1 = sequential)
    #[serde(default = "default_item_concurrency")]
    pub item_concurrency: usize,

    /// Pause between chunks when no item was rate limited (default: 3 seconds)
    #[serde(default = "default_base_cooldown", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub base_cooldown: Duration,

    /// Pause between chunks after a chunk hit the generation rate limit (default: 10 seconds)
    #[serde(default = "default_rate_limited_cooldown", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub rate_limited_cooldown: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_identifiers: default_max_identifiers(),
            item_concurrency: default_item_concurrency(),
            base_cooldown: default_base_cooldown(),
            rate_limited_cooldown: default_rate_limited_cooldown(),
        }
    }
}

/// Retry behavior for calls to external services
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Total attempts per call, including the first (default: 4)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before retrying a transient failure (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub initial_delay: Duration,

    /// Initial delay before retrying a rate-limited call (default: 5 seconds)
    #[serde(default = "default_rate_limit_delay", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub rate_limit_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff of transient failures (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            rate_limit_delay: default_rate_limit_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Content retrieval service settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FetcherConfig {
    /// Base URL of the post lookup API (default: "https://api.vxtwitter.com")
    #[serde(default = "default_fetcher_api_base")]
    pub api_base: String,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_base: default_fetcher_api_base(),
            timeout: default_fetch_timeout(),
        }
    }
}

/// Constraints every generated output set must satisfy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationConstraints {
    /// Number of outputs per item (default: 2)
    #[serde(default = "default_output_count")]
    pub count: usize,

    /// Minimum words per output (default: 5)
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Maximum words per output (default: 12)
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        Self {
            count: default_output_count(),
            min_words: default_min_words(),
            max_words: default_max_words(),
        }
    }
}

/// Text generation service settings (OpenAI-compatible chat completions)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeneratorConfig {
    /// API base URL (default: "https://api.openai.com/v1")
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,

    /// Bearer token (usually supplied via `OPENAI_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Model identifier (default: "gpt-4o-mini")
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature (default: 0.65)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit (default: 60)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_generate_timeout", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub timeout: Duration,

    /// Output constraints passed with every request
    #[serde(default)]
    pub constraints: GenerationConstraints,

    /// Prompt template; `{count}`, `{min_words}`, `{max_words}` and `{text}` are substituted
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_generate_timeout(),
            constraints: GenerationConstraints::default(),
            prompt_template: default_prompt_template(),
        }
    }
}

/// HTTP API settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind the API server (default: 0.0.0.0:10000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; "*" allows any (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
        }
    }
}

/// Periodic self-ping to keep hosted instances from idling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KeepAliveConfig {
    /// URL to ping (None = disabled)
    #[serde(default)]
    pub url: Option<String>,

    /// Time between pings (default: 300 seconds)
    #[serde(default = "default_keep_alive_interval", with = "duration_serde")]
    #[schema(value_type = f64)]
    pub interval: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval: default_keep_alive_interval(),
        }
    }
}

/// Main configuration for the batch service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Batch scheduling
    #[serde(default)]
    pub batch: BatchConfig,

    /// Retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Content retrieval service
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Text generation service
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// HTTP API
    #[serde(default)]
    pub api: ApiConfig,

    /// Keep-alive pinger
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Apply environment overrides
    ///
    /// - `OPENAI_API_KEY` / `OPENAI_BASE_URL` for the generator
    /// - `CROWNTALK_BIND` (full socket address) or `PORT` for the API server
    /// - `CROWNTALK_KEEP_ALIVE_URL` to enable the keep-alive pinger
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_env_from(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.generator.api_key = Some(key);
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.generator.base_url = base_url;
        }
        if let Some(bind) = var("CROWNTALK_BIND") {
            self.api.bind_address = bind
                .parse()
                .map_err(|_| Error::config("api.bind_address", format!("invalid address '{bind}'")))?;
        } else if let Some(port) = var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::config("api.bind_address", format!("invalid port '{port}'")))?;
            self.api.bind_address.set_port(port);
        }
        if let Some(url) = var("CROWNTALK_KEEP_ALIVE_URL") {
            self.keep_alive.url = Some(url);
        }
        Ok(())
    }

    /// Check values that would make a run impossible
    pub fn validate(&self) -> Result<()> {
        if self.batch.chunk_size == 0 {
            return Err(Error::config("batch.chunk_size", "must be at least 1"));
        }
        if self.batch.item_concurrency == 0 {
            return Err(Error::config("batch.item_concurrency", "must be at least 1"));
        }
        if self.batch.max_identifiers == 0 {
            return Err(Error::config("batch.max_identifiers", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be a number >= 1.0",
            ));
        }
        let constraints = &self.generator.constraints;
        if constraints.count == 0 {
            return Err(Error::config("generator.constraints.count", "must be at least 1"));
        }
        if constraints.min_words > constraints.max_words {
            return Err(Error::config(
                "generator.constraints",
                "min_words must not exceed max_words",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_chunk_size() -> usize {
    2
}

fn default_max_identifiers() -> usize {
    30
}

fn default_item_concurrency() -> usize {
    1
}

fn default_base_cooldown() -> Duration {
    Duration::from_secs(3)
}

fn default_rate_limited_cooldown() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_rate_limit_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_fetcher_api_base() -> String {
    "https://api.vxtwitter.com".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_output_count() -> usize {
    2
}

fn default_min_words() -> usize {
    5
}

fn default_max_words() -> usize {
    12
}

fn default_generator_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.65
}

fn default_max_tokens() -> u32 {
    60
}

fn default_generate_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_prompt_template() -> String {
    "Generate {count} humanlike comments.\n\
     Rules:\n\
     - {min_words}-{max_words} words each\n\
     - no punctuation at end\n\
     - no emojis, no hashtags\n\
     - comments must be different and based on the post\n\
     - exactly {count} lines, no labels\n\
     \n\
     Post:\n\
     {text}\n"
        .to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 10000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_keep_alive_interval() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper (seconds, fractional values allowed)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
