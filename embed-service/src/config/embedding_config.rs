use crate::config::EmbeddingBackend;
use crate::error_handler::{
    ConfigError, Result, env_opt, env_opt_parse, must_env, validate_http_endpoint,
};

/// Embedding backend configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Base URL of an OpenAI-compatible server (with or without a trailing `/v1`).
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    /// Dense vector size; the collection is created with it.
    pub dim: usize,
    /// Texts per `encode_documents` call.
    pub batch_size: usize,
    /// Concurrent encode batches while indexing.
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Attempts per HTTP request (1 = no retry).
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hash,
            base_url: None,
            api_key: None,
            model: "BAAI/bge-m3".to_string(),
            dim: 1024,
            batch_size: 256,
            concurrency: 4,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl EmbeddingConfig {
    /// Builds the config from `EMBEDDING_*` variables (see [`crate::config`]).
    ///
    /// # Errors
    /// - [`ConfigError::UnsupportedProvider`] for an unknown `EMBEDDING_PROVIDER`
    /// - [`ConfigError::MissingVar`] when `openai` lacks a base URL or key
    /// - [`ConfigError::InvalidNumber`] for unparsable numbers
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let backend = match env_opt("EMBEDDING_PROVIDER") {
            Some(s) => s.parse::<EmbeddingBackend>()?,
            None => d.backend,
        };

        let (base_url, api_key) = match backend {
            EmbeddingBackend::OpenAi => (
                Some(must_env("EMBEDDING_BASE_URL")?),
                Some(must_env("EMBEDDING_API_KEY")?),
            ),
            EmbeddingBackend::Hash => (env_opt("EMBEDDING_BASE_URL"), env_opt("EMBEDDING_API_KEY")),
        };

        let cfg = Self {
            backend,
            base_url,
            api_key,
            model: env_opt("EMBEDDING_MODEL").unwrap_or(d.model),
            dim: env_opt_parse("EMBEDDING_DIM", "expected usize")?.unwrap_or(d.dim),
            batch_size: env_opt_parse("EMBEDDING_BATCH_SIZE", "expected usize")?
                .unwrap_or(d.batch_size),
            concurrency: env_opt_parse("EMBEDDING_CONCURRENCY", "expected usize")?
                .unwrap_or(d.concurrency),
            timeout_secs: env_opt_parse("EMBEDDING_TIMEOUT_SECS", "expected u64")?
                .unwrap_or(d.timeout_secs),
            max_retries: env_opt_parse("EMBEDDING_MAX_RETRIES", "expected u32")?
                .unwrap_or(d.max_retries),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks ranges and, for HTTP backends, the endpoint scheme.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        if self.dim == 0 {
            return Err(out_of_range("dim", "expected > 0"));
        }
        if self.batch_size == 0 {
            return Err(out_of_range("batch_size", "expected > 0"));
        }
        if self.concurrency == 0 {
            return Err(out_of_range("concurrency", "expected > 0"));
        }
        if self.max_retries == 0 {
            return Err(out_of_range("max_retries", "expected >= 1"));
        }
        if self.backend == EmbeddingBackend::OpenAi {
            let url = self
                .base_url
                .as_deref()
                .ok_or(ConfigError::MissingVar("EMBEDDING_BASE_URL"))?;
            validate_http_endpoint("EMBEDDING_BASE_URL", url)?;
            if self.api_key.is_none() {
                return Err(ConfigError::MissingVar("EMBEDDING_API_KEY").into());
            }
        }
        Ok(())
    }
}

fn out_of_range(field: &'static str, detail: &'static str) -> crate::ProviderError {
    ConfigError::OutOfRange { field, detail }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_offline() {
        assert!(EmbeddingConfig::default().validate().is_ok());
    }

    #[test]
    fn openai_requires_endpoint_and_key() {
        let mut cfg = EmbeddingConfig {
            backend: EmbeddingBackend::OpenAi,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        cfg.base_url = Some("ftp://nope".into());
        cfg.api_key = Some("k".into());
        assert!(cfg.validate().is_err());
        cfg.base_url = Some("https://api.example.com/v1".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_dim_rejected() {
        let cfg = EmbeddingConfig {
            dim: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
