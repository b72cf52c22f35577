use std::fmt;
use std::str::FromStr;

use crate::error_handler::ConfigError;

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing; no network, dense + sparse.
    #[default]
    Hash,
    /// OpenAI-compatible `/v1/embeddings` endpoint; dense only.
    OpenAi,
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hash" | "local" => Ok(Self::Hash),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hash => "hash",
            Self::OpenAi => "openai",
        })
    }
}
