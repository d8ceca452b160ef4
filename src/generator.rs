//! Text generation
//!
//! [`TextGenerator`] is the seam to the external completion service.
//! [`OpenAiGenerator`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint and enforces the output contract with an [`OutputContract`]: a
//! response that does not yield enough well-formed lines is reported as a
//! transient failure so the retry policy asks again.

use crate::config::{GenerationConstraints, GeneratorConfig};
use crate::error::{Error, GenerationError, Result};
use crate::types::Content;
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

/// Maximum accepted response body (256 KiB)
const MAX_RESPONSE_LEN: usize = 256 * 1024;

/// One item's request to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Source content to respond to
    pub content: Content,
    /// Output constraints
    pub constraints: GenerationConstraints,
}

/// Produces generated outputs for a request
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate exactly `request.constraints.count` outputs
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<Vec<String>, GenerationError>;
}

/// Line-level cleanup and validation of raw generator output
#[derive(Debug, Clone)]
pub struct OutputContract {
    list_marker: Regex,
}

impl OutputContract {
    /// Build the contract
    ///
    /// # Errors
    /// Returns error if the cleanup pattern fails to compile
    pub fn new() -> Result<Self> {
        let list_marker = Regex::new(r#"^\s*(?:[-*•]|\d+[.):])\s+"#)
            .map_err(|e| Error::Other(format!("invalid list marker pattern: {e}")))?;
        Ok(Self { list_marker })
    }

    /// Clean one raw line: strip list markers, wrapping quotes and trailing punctuation
    pub fn clean_line(&self, line: &str) -> String {
        let line = self.list_marker.replace(line, "");
        line.trim()
            .trim_matches('"')
            .trim_end_matches(['.', ',', '!', '?', ';', ':'])
            .trim()
            .to_string()
    }

    /// Extract exactly `constraints.count` valid lines from `raw`
    ///
    /// # Errors
    /// Returns [`GenerationError::Transient`] when fewer valid lines are present
    pub fn apply(
        &self,
        raw: &str,
        constraints: &GenerationConstraints,
    ) -> std::result::Result<Vec<String>, GenerationError> {
        let mut lines: Vec<String> = raw
            .lines()
            .map(|line| self.clean_line(line))
            .filter(|line| {
                let words = line.split_whitespace().count();
                words >= constraints.min_words && words <= constraints.max_words
            })
            .collect();

        if lines.len() < constraints.count {
            return Err(GenerationError::Transient(format!(
                "expected {} lines of {}-{} words, got {}",
                constraints.count,
                constraints.min_words,
                constraints.max_words,
                lines.len()
            )));
        }

        lines.truncate(constraints.count);
        Ok(lines)
    }
}

/// Substitute the request into a prompt template
pub fn render_prompt(template: &str, request: &GenerationRequest) -> String {
    template
        .replace("{count}", &request.constraints.count.to_string())
        .replace("{min_words}", &request.constraints.min_words.to_string())
        .replace("{max_words}", &request.constraints.max_words.to_string())
        .replace("{text}", &request.content.text)
}

/// Generator backed by an OpenAI-compatible chat completions API
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    prompt_template: String,
    contract: OutputContract,
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl OpenAiGenerator {
    /// Create a generator from configuration
    ///
    /// # Errors
    /// Returns a configuration error if no API key is configured
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("generator.api_key", "OPENAI_API_KEY not set"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::config("generator.api_key", "invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            prompt_template: config.prompt_template.clone(),
            contract: OutputContract::new()?,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn classify_status(status: u16, message: String) -> GenerationError {
    match status {
        429 => GenerationError::RateLimited(message),
        408 | 409 | 500..=599 => GenerationError::Transient(message),
        _ => GenerationError::Permanent(message),
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<Vec<String>, GenerationError> {
        let api_req = ChatApiRequest {
            model: &self.model,
            messages: vec![ApiMessage {
                role: "user",
                content: render_prompt(&self.prompt_template, request),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await
            .map_err(|e| GenerationError::Transient(e.to_string()))?;

        let status = response.status();

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| GenerationError::Transient(e.to_string()))?
        {
            if bytes.len() + chunk.len() > MAX_RESPONSE_LEN {
                return Err(GenerationError::Transient(format!(
                    "response larger than {MAX_RESPONSE_LEN} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let parsed = serde_json::from_slice::<ChatApiResponse>(&bytes);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|p| p.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(classify_status(status.as_u16(), message));
        }

        let parsed =
            parsed.map_err(|e| GenerationError::Transient(format!("invalid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(GenerationError::Transient(
                error.message.unwrap_or_else(|| "unknown API error".to_string()),
            ));
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        self.contract.apply(&content, &request.constraints)
    }
}
