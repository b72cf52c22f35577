//! Provider configuration loaded from environment variables.
//!
//! # Environment variables
//!
//! Embeddings:
//! - `EMBEDDING_PROVIDER`     = `hash` (default, offline) | `openai`
//! - `EMBEDDING_BASE_URL`     = OpenAI-compatible endpoint (required for `openai`)
//! - `EMBEDDING_API_KEY`      = bearer token (required for `openai`)
//! - `EMBEDDING_MODEL`        = model id (default `BAAI/bge-m3`)
//! - `EMBEDDING_DIM`          = vector size (default 1024)
//! - `EMBEDDING_BATCH_SIZE`   = texts per encode call (default 256)
//! - `EMBEDDING_CONCURRENCY`  = concurrent encode batches while indexing (default 4)
//! - `EMBEDDING_TIMEOUT_SECS` = per-request timeout (default 60)
//! - `EMBEDDING_MAX_RETRIES`  = attempts per request (default 3)
//!
//! Reranker (optional; without a base URL the fused order is kept):
//! - `RERANKER_BASE_URL`, `RERANKER_API_KEY`, `RERANKER_MODEL`

pub mod embedding_backend;
pub mod embedding_config;
pub mod rerank_config;

pub use embedding_backend::EmbeddingBackend;
pub use embedding_config::EmbeddingConfig;
pub use rerank_config::RerankConfig;
