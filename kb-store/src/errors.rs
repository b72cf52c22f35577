//! Unified error types for the crate.

use embed_service::ProviderError;
use md_chunker::ChunkError;
use thiserror::Error;

/// Vector store failures (unreachable, missing collection, bad data).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),

    /// Mismatch between a vector and the collection's dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Stored payload could not be converted to or from the chunk schema.
    #[error("payload error: {0}")]
    Payload(String),

    /// Operation needs a collection that does not exist.
    #[error("collection '{0}' does not exist")]
    MissingCollection(String),
}

/// Errors from the hybrid query path.
///
/// The public `search` entry point folds these into
/// [`crate::SearchResponse::error`] instead of returning them.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Query encoding failed (backend error after retries, or init failure).
    #[error("query encoding failed: {0}")]
    Encode(#[source] ProviderError),

    /// Reranking failed, including a score count that does not match the
    /// candidate count.
    #[error("rerank failed: {0}")]
    Rerank(#[source] ProviderError),

    /// Candidate retrieval failed.
    #[error("store query failed: {0}")]
    Store(#[from] StoreError),
}

/// Top-level error for knowledge-base operations.
#[derive(Debug, Error)]
pub enum KbError {
    /// Failed to parse an environment variable into the expected type.
    #[error("failed to parse env variable: {key} = '{value}'")]
    EnvParse { key: String, value: String },

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// A document could not be read or parsed.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document could not be encoded or written.
    #[error("indexing '{doc_id}' failed: {reason}")]
    IndexFailed { doc_id: String, reason: String },

    /// Change discovery through git failed.
    #[error("git error: {0}")]
    Git(String),
}
