//! OpenAI-compatible embeddings client (`POST {base}/v1/embeddings`).
//!
//! Works with OpenAI, SiliconFlow, Jina, TEI and similar servers. Dense only:
//! [`Encoded::sparse`] is always `None`, which makes the retriever fall back
//! to its lexical or dense-only mode.
//!
//! Constructor validation:
//! - `cfg.api_key` must be present
//! - `cfg.base_url` must start with http:// or https://

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::EmbeddingConfig;
use crate::error_handler::{ConfigError, ProviderError, Result, make_snippet, validate_http_endpoint};
use crate::provider::{EmbeddingProvider, Encoded, ProviderFuture};
use crate::retry::RetryPolicy;
use crate::services::api_url;

/// Upper bound on texts per HTTP request; larger batches tend to time out or
/// come back empty on hosted APIs.
pub const MAX_API_BATCH: usize = 64;

/// Thin client for an OpenAI-compatible embeddings API.
#[derive(Debug)]
pub struct OpenAiCompatEmbedder {
    client: reqwest::Client,
    model: String,
    dim: usize,
    url: String,
    retry: RetryPolicy,
}

impl OpenAiCompatEmbedder {
    /// Creates a new embedder from the given config.
    ///
    /// # Errors
    /// - [`ConfigError::MissingVar`] if the API key or base URL is missing
    /// - [`ConfigError::InvalidFormat`] if the base URL is not http(s)
    /// - [`ProviderError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: &EmbeddingConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or(ConfigError::MissingVar("EMBEDDING_API_KEY"))?;
        let base = cfg
            .base_url
            .clone()
            .ok_or(ConfigError::MissingVar("EMBEDDING_BASE_URL"))?;
        validate_http_endpoint("EMBEDDING_BASE_URL", &base)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
                ConfigError::InvalidFormat {
                    var: "EMBEDDING_API_KEY",
                    reason: "not a valid header value",
                }
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let url = api_url(&base, "embeddings");
        info!(
            model = %cfg.model,
            url = %url,
            dim = cfg.dim,
            timeout_secs = cfg.timeout_secs,
            "OpenAiCompatEmbedder initialized"
        );

        Ok(Self {
            client,
            model: cfg.model.clone(),
            dim: cfg.dim,
            url,
            retry: RetryPolicy::new(cfg.max_retries),
        })
    }

    /// One HTTP call for up to [`MAX_API_BATCH`] inputs.
    async fn embed_batch(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.model,
            input,
        };
        debug!(model = %self.model, inputs = input.len(), "POST {}", self.url);

        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(
                %status,
                url = %self.url,
                %snippet,
                latency_ms = started.elapsed().as_millis() as u64,
                "embeddings endpoint returned non-success status"
            );
            return Err(ProviderError::HttpStatus {
                status,
                url: self.url.clone(),
                snippet,
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::Decode(format!("serde error: {e}; expected `data[].embedding`"))
        })?;
        if out.data.is_empty() {
            return Err(ProviderError::Decode("empty `data` in embeddings response".into()));
        }
        if out.data.len() != input.len() {
            return Err(ProviderError::CountMismatch {
                expected: input.len(),
                got: out.data.len(),
            });
        }

        let mut items = out.data;
        // Servers may reorder; `index` is authoritative when present.
        items.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        let mut vectors = Vec::with_capacity(items.len());
        for item in items {
            if item.embedding.len() != self.dim {
                return Err(ProviderError::DimensionMismatch {
                    got: item.embedding.len(),
                    want: self.dim,
                });
            }
            vectors.push(item.embedding);
        }

        debug!(
            inputs = input.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "embeddings batch completed"
        );
        Ok(vectors)
    }
}

impl EmbeddingProvider for OpenAiCompatEmbedder {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_documents<'a>(
        &'a self,
        texts: &'a [String],
        batch_size: usize,
    ) -> ProviderFuture<'a, Vec<Encoded>> {
        Box::pin(async move {
            let api_batch = batch_size.clamp(1, MAX_API_BATCH);
            let mut out = Vec::with_capacity(texts.len());
            for (i, chunk) in texts.chunks(api_batch).enumerate() {
                let vectors = self.retry.run("openai", move || self.embed_batch(chunk)).await?;
                out.extend(vectors.into_iter().map(|dense| Encoded { dense, sparse: None }));
                if texts.len() > api_batch {
                    debug!(done = out.len(), total = texts.len(), batch = i, "embedding progress");
                }
            }
            Ok(out)
        })
    }

    fn encode_query<'a>(&'a self, text: &'a str) -> ProviderFuture<'a, Encoded> {
        Box::pin(async move {
            let owned = [text.to_string()];
            let input: &[String] = &owned;
            let mut vectors = self.retry.run("openai", move || self.embed_batch(input)).await?;
            let dense = vectors
                .pop()
                .ok_or_else(|| ProviderError::Decode("no vector for query".into()))?;
            Ok(Encoded { dense, sparse: None })
        })
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

/// Request body for `/v1/embeddings`.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response body for `/v1/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}
