use crate::error_handler::{Result, env_opt, env_opt_parse, validate_http_endpoint};

/// HTTP reranker configuration (`/v1/rerank`, Jina/Cohere/TEI style).
#[derive(Debug, Clone)]
pub struct RerankConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl RerankConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: "BAAI/bge-reranker-v2-m3".to_string(),
            timeout_secs: 60,
            max_retries: 3,
        }
    }

    /// `Ok(None)` when `RERANKER_BASE_URL` is unset: callers fall back to
    /// keeping the fused order.
    ///
    /// Timeout and retry counts are shared with the embedding settings
    /// (`EMBEDDING_TIMEOUT_SECS`, `EMBEDDING_MAX_RETRIES`).
    pub fn from_env() -> Result<Option<Self>> {
        let Some(base_url) = env_opt("RERANKER_BASE_URL") else {
            return Ok(None);
        };
        validate_http_endpoint("RERANKER_BASE_URL", &base_url)?;

        let mut cfg = Self::new(base_url);
        cfg.api_key = env_opt("RERANKER_API_KEY");
        if let Some(model) = env_opt("RERANKER_MODEL") {
            cfg.model = model;
        }
        if let Some(t) = env_opt_parse("EMBEDDING_TIMEOUT_SECS", "expected u64")? {
            cfg.timeout_secs = t;
        }
        if let Some(r) = env_opt_parse::<u32>("EMBEDDING_MAX_RETRIES", "expected u32")? {
            cfg.max_retries = r.max(1);
        }
        Ok(Some(cfg))
    }
}
