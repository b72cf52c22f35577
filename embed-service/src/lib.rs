//! Embedding and rerank capabilities for the knowledge base.
//!
//! - [`provider`]: the [`EmbeddingProvider`] / [`RerankProvider`] interfaces.
//! - [`services`]: OpenAI-compatible HTTP backends with bounded retries.
//! - [`hash_embedder`] / [`passthrough_reranker`]: deterministic offline backends.
//! - [`context`]: lazily-initialized provider handles ([`ProviderContext`]).
//! - [`telemetry`]: a library-scoped `tracing` layer.

pub mod config;
pub mod context;
pub mod error_handler;
pub mod hash_embedder;
pub mod passthrough_reranker;
pub mod provider;
pub mod retry;
pub mod services;
pub mod telemetry;

pub use config::{EmbeddingBackend, EmbeddingConfig, RerankConfig};
pub use context::{LazyProvider, ProviderContext};
pub use error_handler::{ConfigError, ProviderError};
pub use hash_embedder::HashEmbedder;
pub use passthrough_reranker::PassthroughReranker;
pub use provider::{EmbeddingProvider, Encoded, ProviderFuture, RerankProvider, SparseVector};
pub use services::{http_reranker::HttpReranker, openai_embedder::OpenAiCompatEmbedder};
