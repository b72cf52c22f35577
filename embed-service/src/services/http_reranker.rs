//! HTTP cross-encoder reranker (`POST {base}/v1/rerank`).
//!
//! Speaks the common Jina/Cohere/TEI shape:
//! request `{model, query, documents}`, response `results[{index, relevance_score}]`.
//! Pairs are grouped by query so each distinct query costs one request.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RerankConfig;
use crate::error_handler::{ConfigError, ProviderError, Result, make_snippet, validate_http_endpoint};
use crate::provider::{ProviderFuture, RerankProvider};
use crate::retry::RetryPolicy;
use crate::services::api_url;

#[derive(Debug)]
pub struct HttpReranker {
    client: reqwest::Client,
    model: String,
    url: String,
    retry: RetryPolicy,
}

impl HttpReranker {
    /// # Errors
    /// [`ConfigError::InvalidFormat`] for a non-http(s) base URL or bad key,
    /// [`ProviderError::HttpTransport`] if the client cannot be built.
    pub fn new(cfg: &RerankConfig) -> Result<Self> {
        validate_http_endpoint("RERANKER_BASE_URL", &cfg.base_url)?;

        let mut headers = header::HeaderMap::new();
        if let Some(key) = &cfg.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                    ConfigError::InvalidFormat {
                        var: "RERANKER_API_KEY",
                        reason: "not a valid header value",
                    }
                })?,
            );
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let url = api_url(&cfg.base_url, "rerank");
        info!(model = %cfg.model, url = %url, "HttpReranker initialized");
        Ok(Self {
            client,
            model: cfg.model.clone(),
            url,
            retry: RetryPolicy::new(cfg.max_retries),
        })
    }

    /// Scores `documents` against `query`, returning one score per document.
    async fn rerank_one(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        let started = Instant::now();
        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: documents.len(),
            return_documents: false,
        };
        debug!(model = %self.model, documents = documents.len(), "POST {}", self.url);

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
                "rerank endpoint returned non-success status"
            );
            return Err(ProviderError::HttpStatus {
                status,
                url: self.url.clone(),
                snippet,
            });
        }

        let out: RerankResponse = resp.json().await.map_err(|e| {
            ProviderError::Decode(format!(
                "serde error: {e}; expected `results[].{{index, relevance_score}}`"
            ))
        })?;
        scores_by_index(out.results, documents.len())
    }
}

/// Places each result at its `index`; every document must be scored once.
fn scores_by_index(results: Vec<RerankItem>, expected: usize) -> Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for item in &results {
        match scores.get_mut(item.index) {
            Some(slot) => *slot = Some(item.relevance_score),
            None => {
                return Err(ProviderError::Decode(format!(
                    "rerank index {} out of range for {expected} documents",
                    item.index
                )));
            }
        }
    }
    let filled: Vec<f32> = scores.iter().flatten().copied().collect();
    if filled.len() != expected {
        return Err(ProviderError::CountMismatch {
            expected,
            got: filled.len(),
        });
    }
    Ok(filled)
}

impl RerankProvider for HttpReranker {
    fn name(&self) -> &'static str {
        "http"
    }

    fn score_pairs<'a>(&'a self, pairs: &'a [(String, String)]) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(async move {
            // query -> positions in `pairs`, first-seen order
            let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
            for (i, (q, _)) in pairs.iter().enumerate() {
                match groups.iter_mut().find(|(gq, _)| *gq == q.as_str()) {
                    Some((_, idx)) => idx.push(i),
                    None => groups.push((q.as_str(), vec![i])),
                }
            }

            let mut scores = vec![0.0f32; pairs.len()];
            for (query, positions) in &groups {
                let docs: Vec<&str> = positions.iter().map(|&i| pairs[i].1.as_str()).collect();
                let docs_ref: &[&str] = &docs;
                let got = self
                    .retry
                    .run("rerank", move || self.rerank_one(query, docs_ref))
                    .await?;
                for (pos, score) in positions.iter().zip(got) {
                    scores[*pos] = score;
                }
            }
            Ok(scores)
        })
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
    return_documents: bool,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankItem>,
}

#[derive(Debug, Deserialize)]
struct RerankItem {
    index: usize,
    relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, relevance_score: f32) -> RerankItem {
        RerankItem {
            index,
            relevance_score,
        }
    }

    #[test]
    fn results_are_reordered_by_index() {
        let got = scores_by_index(vec![item(2, 0.9), item(0, 0.1), item(1, 0.5)], 3).unwrap();
        assert_eq!(got, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn missing_score_is_count_mismatch() {
        let err = scores_by_index(vec![item(0, 0.1)], 2).unwrap_err();
        assert!(matches!(err, ProviderError::CountMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn out_of_range_index_is_decode_error() {
        let err = scores_by_index(vec![item(5, 0.1)], 2).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn decodes_wire_format() {
        let json = r#"{"model":"m","results":[{"index":0,"relevance_score":0.73,"document":null}]}"#;
        let out: RerankResponse = serde_json::from_str(json).unwrap();
        assert_eq!(out.results[0].index, 0);
        assert!((out.results[0].relevance_score - 0.73).abs() < 1e-6);
    }

    #[test]
    fn new_rejects_bad_url() {
        let cfg = RerankConfig::new("localhost:8080");
        assert!(HttpReranker::new(&cfg).is_err());
        assert!(HttpReranker::new(&RerankConfig::new("http://localhost:8080")).is_ok());
    }
}
