use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::application::GeneratorClient;
use crate::domain::DomainError;

/// Default target: LM Studio running locally on its standard port.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";
const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "ministral-3b-2512";
const MAX_TOKENS: u32 = 1024;

const SYSTEM_PROMPT: &str = "You are a code analysis assistant. Answer questions about a \
     repository using only the static analysis facts and code snippets provided in the prompt.";

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(serde::Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

/// Single-turn text generation against the Anthropic Messages API (and
/// compatible endpoints such as LM Studio).
///
/// **Local-first defaults**: targets LM Studio on `http://localhost:1234`
/// without an API key. Override via environment variables to target the
/// cloud:
///
/// ```text
/// ANTHROPIC_BASE_URL=https://api.anthropic.com
/// ANTHROPIC_API_KEY=sk-ant-...
/// ANTHROPIC_MODEL=claude-haiku-4-5
/// ```
///
/// Before each request the client sends a lightweight `HEAD /` probe with
/// a 2-second timeout, so an unreachable server fails fast instead of
/// hanging until the request timeout.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base: String = base_url.into();
        let trimmed = base.trim_end_matches('/');
        let url = format!("{trimmed}{MESSAGES_PATH}");
        let base_url = format!("{trimmed}/");
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            probe_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            url,
            base_url,
        }
    }

    /// Construct from environment variables with local-first defaults.
    pub fn from_env(timeout: Duration) -> Self {
        let base =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        Self::new(key, model, base, timeout)
    }
}

#[async_trait]
impl GeneratorClient for AnthropicGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, DomainError> {
        // Fast connectivity probe. Any HTTP response, even 4xx/5xx, means
        // the server is up; only connect errors and probe timeouts bail.
        match self.probe_client.head(&self.base_url).send().await {
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(DomainError::generator(format!(
                    "server not reachable at {}: {e}",
                    self.base_url.trim_end_matches('/')
                )));
            }
            _ => {}
        }

        let request = ApiRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::generator(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Generator API returned {status}: {body}");
            return Err(DomainError::generator(format!("API returned {status}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| DomainError::generator(format!("failed to parse response: {e}")))?;

        Ok(api_response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default())
    }
}
