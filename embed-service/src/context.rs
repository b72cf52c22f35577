//! Lazily-initialized provider handles.
//!
//! Building a provider may be expensive (HTTP client setup, model warm-up),
//! so handles are created on first use. A [`ProviderContext`] is built once by
//! the application and passed to whoever needs providers; there is no global.
//!
//! Initialization contract of [`LazyProvider::get`]:
//! - the init closure runs at most once successfully;
//! - concurrent first callers wait for that single initialization;
//! - a failed initialization is returned to the caller and retried by the
//!   next call.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{EmbeddingBackend, EmbeddingConfig, RerankConfig};
use crate::error_handler::Result;
use crate::hash_embedder::HashEmbedder;
use crate::passthrough_reranker::PassthroughReranker;
use crate::provider::{EmbeddingProvider, RerankProvider};
use crate::services::{http_reranker::HttpReranker, openai_embedder::OpenAiCompatEmbedder};

type InitFn<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// Single-acquisition guard around a shared provider.
pub struct LazyProvider<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
    init: InitFn<T>,
}

impl<T: ?Sized> LazyProvider<T> {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    /// Already-initialized handle.
    pub fn ready(value: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let fallback = value.clone();
        Self {
            cell: OnceCell::new_with(Some(value)),
            init: Box::new(move || Ok(fallback.clone())),
        }
    }

    /// Returns the shared handle, initializing it on first use.
    pub async fn get(&self) -> Result<Arc<T>> {
        self.cell
            .get_or_try_init(|| async { (self.init)() })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

/// Embedder + reranker handles shared by indexing and retrieval.
pub struct ProviderContext {
    embedder: LazyProvider<dyn EmbeddingProvider>,
    reranker: LazyProvider<dyn RerankProvider>,
}

impl ProviderContext {
    /// Providers are built from config on first use.
    ///
    /// Without a rerank config the [`PassthroughReranker`] keeps fused order.
    pub fn from_config(embedding: EmbeddingConfig, rerank: Option<RerankConfig>) -> Self {
        let embedder = LazyProvider::new(move || -> Result<Arc<dyn EmbeddingProvider>> {
            info!(backend = %embedding.backend, model = %embedding.model, "initializing embedder");
            let provider: Arc<dyn EmbeddingProvider> = match embedding.backend {
                EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(embedding.dim)),
                EmbeddingBackend::OpenAi => Arc::new(OpenAiCompatEmbedder::new(&embedding)?),
            };
            Ok(provider)
        });
        let reranker = LazyProvider::new(move || -> Result<Arc<dyn RerankProvider>> {
            let provider: Arc<dyn RerankProvider> = match &rerank {
                Some(cfg) => {
                    info!(model = %cfg.model, "initializing http reranker");
                    Arc::new(HttpReranker::new(cfg)?)
                }
                None => {
                    debug!("no reranker configured, keeping fused order");
                    Arc::new(PassthroughReranker)
                }
            };
            Ok(provider)
        });
        Self { embedder, reranker }
    }

    /// Pre-built providers (tests, custom backends).
    pub fn with_providers(
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Arc<dyn RerankProvider>,
    ) -> Self {
        Self {
            embedder: LazyProvider::ready(embedder),
            reranker: LazyProvider::ready(reranker),
        }
    }

    pub async fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedder.get().await
    }

    pub async fn reranker(&self) -> Result<Arc<dyn RerankProvider>> {
        self.reranker.get().await
    }
}
