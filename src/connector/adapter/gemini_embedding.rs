use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TokenBucket;
use crate::application::{embedding_cache_key, EmbeddingService, KeyValueCache};
use crate::domain::{Config, DomainError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DIMENSIONS: usize = 768;
/// Base backoff for retries without a Retry-After hint; doubles per attempt.
const BACKOFF_BASE_SECS: u64 = 20;

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Remote embedder against a Gemini-style REST endpoint.
///
/// Free-tier friendly: every outbound request takes a token from a
/// shared bucket, 429s honor Retry-After (falling back to exponential
/// backoff), and single-text calls consult the embedding cache before
/// touching the network.
pub struct GeminiEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    limiter: Arc<TokenBucket>,
    cache: Option<Arc<dyn KeyValueCache>>,
    max_retries: u32,
    batch_size: usize,
    cache_ttl: Duration,
}

impl GeminiEmbedding {
    pub fn new(api_key: impl Into<String>, config: &Config, limiter: Arc<TokenBucket>) -> Self {
        let base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let model =
            std::env::var("GEMINI_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.embed_timeout_s))
                .build()
                .unwrap_or_default(),
            base_url,
            model,
            api_key: api_key.into(),
            limiter,
            cache: None,
            max_retries: config.embed_max_retries,
            batch_size: config.embed_batch_size,
            cache_ttl: Duration::from_secs(config.embedding_cache_ttl_s),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn cached_vector(&self, text: &str) -> Option<Vec<f32>> {
        let cache = self.cache.as_ref()?;
        let bytes = cache.get(&embedding_cache_key(text)).await?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn store_vector(&self, text: &str, vector: &[f32]) {
        if let Some(cache) = &self.cache {
            if let Ok(bytes) = serde_json::to_vec(vector) {
                cache
                    .set(&embedding_cache_key(text), bytes, self.cache_ttl)
                    .await;
            }
        }
    }

    /// One rate-limited, retried call embedding up to `batch_size` texts.
    async fn call_api(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, DomainError> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.model),
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;

            let response = self.client.post(&url).json(&request).send().await;
            match response {
                Ok(response) if response.status().is_success() => {
                    let parsed: BatchResponse = response.json().await.map_err(|e| {
                        DomainError::embedding(format!("malformed embedding response: {}", e))
                    })?;
                    if parsed.embeddings.len() != texts.len() {
                        return Err(DomainError::embedding(format!(
                            "expected {} embeddings, got {}",
                            texts.len(),
                            parsed.embeddings.len()
                        )));
                    }
                    return Ok(parsed.embeddings.into_iter().map(|e| e.values).collect());
                }
                Ok(response) => {
                    let status = response.status();
                    let throttled = status.as_u16() == 429;
                    let retryable = throttled || status.is_server_error();
                    if !retryable || attempt >= self.max_retries {
                        return Err(if throttled {
                            DomainError::rate_limited(format!(
                                "embedding API still throttled after {} retries",
                                self.max_retries
                            ))
                        } else {
                            DomainError::embedding(format!("embedding API returned {}", status))
                        });
                    }

                    let backoff = retry_after(&response)
                        .unwrap_or_else(|| Duration::from_secs(BACKOFF_BASE_SECS << attempt));
                    warn!(
                        "Embedding API returned {}, retrying in {}s (attempt {}/{})",
                        status,
                        backoff.as_secs(),
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(DomainError::embedding(format!(
                            "embedding request failed: {}",
                            e
                        )));
                    }
                    let backoff = Duration::from_secs(BACKOFF_BASE_SECS << attempt);
                    warn!(
                        "Embedding request failed ({}), retrying in {}s",
                        e,
                        backoff.as_secs()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl EmbeddingService for GeminiEmbedding {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        if let Some(vector) = self.cached_vector(text).await {
            debug!("Embedding cache hit");
            return Ok(vector);
        }

        let vectors = self.call_api(&[text]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::embedding("empty embedding response"))?;

        self.store_vector(text, &vector).await;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // Fill from cache first; only misses go over the wire.
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<usize> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            match self.cached_vector(text).await {
                Some(vector) => vectors.push(Some(vector)),
                None => {
                    vectors.push(None);
                    misses.push(i);
                }
            }
        }

        for group in misses.chunks(self.batch_size) {
            let group_texts: Vec<&str> = group.iter().map(|&i| texts[i].as_str()).collect();
            let group_vectors = self.call_api(&group_texts).await?;
            for (&i, vector) in group.iter().zip(group_vectors) {
                self.store_vector(&texts[i], &vector).await;
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().map(|v| v.unwrap_or_default()).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
