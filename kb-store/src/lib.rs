//! Markdown knowledge base over a vector store: indexing and hybrid retrieval.
//!
//! This crate provides a clean API to:
//! - Index Markdown files (full, incremental, single file, raw chunks) with
//!   idempotent replace semantics
//! - Retrieve top‑K chunks for a query via dense + sparse/lexical candidate
//!   lists, RRF fusion, reranking and top-N protection
//! - Inspect and maintain the collection (status, keyword search, deletes)
//!
//! The design is flat (no deep nesting) and splits responsibilities into focused modules.

mod config;
mod discovery;
mod embed_pool;
mod errors;
mod filters;
mod fusion;
mod ingest;
mod memory_store;
mod qdrant_facade;
mod record;
mod retrieve;
mod store;
#[cfg(test)]
mod test_support;

pub use config::{DistanceKind, KbConfig, SearchSettings};
pub use discovery::markdown_files;
pub use embed_pool::{FailedBatch, encode_chunks};
pub use errors::{KbError, RetrievalError, StoreError};
pub use filters::{FieldMatch, StoreFilter};
pub use fusion::{RRF_K, rrf_fuse};
pub use ingest::IndexLifecycleManager;
pub use memory_store::MemoryStore;
pub use qdrant_facade::QdrantStore;
pub use record::{
    CandidateSource, ChunkPayload, DocSummary, EncodedChunk, FusedCandidate, IndexReport,
    KeywordHit, RankedResult, SEARCH_NOTE, SearchCandidate, SearchHit, SearchRequest,
    SearchResponse, StatusReport, StorePoint, StoreStats,
};
pub use retrieve::{HybridRetriever, QueryMode, Retrieved, apply_protection, dedupe_by_point};
pub use store::{DENSE_VECTOR, SPARSE_VECTOR, ScrolledPoint, StoreFuture, VectorStore};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use embed_service::ProviderContext;
use md_chunker::Chunk;
use tracing::{debug, info, trace};

/// Points inspected by [`KnowledgeBase::status`].
pub const STATUS_SAMPLE: usize = 1000;
/// Max chars of chunk text returned by [`KnowledgeBase::keyword_search`].
pub const KEYWORD_TEXT_CLAMP: usize = 500;

/// High-level facade that wires configuration, providers and the store.
///
/// This is the single entry point recommended for application code.
pub struct KnowledgeBase {
    cfg: Arc<KbConfig>,
    store: Arc<dyn VectorStore>,
    indexer: IndexLifecycleManager,
    retriever: HybridRetriever,
}

impl KnowledgeBase {
    /// Constructs a knowledge base over Qdrant with providers built lazily
    /// from `cfg`.
    ///
    /// # Errors
    /// Returns `KbError::Config` on invalid settings or `KbError::Store` if the
    /// client cannot be created.
    pub fn new(cfg: KbConfig) -> Result<Self, KbError> {
        trace!("KnowledgeBase::new collection={}", cfg.collection);
        let store = Arc::new(QdrantStore::new(&cfg)?);
        let providers = ProviderContext::from_config(cfg.embedding.clone(), cfg.rerank.clone());
        Ok(Self::with_parts(cfg, store, providers))
    }

    /// [`KbConfig::from_env`] followed by [`KnowledgeBase::new`].
    pub fn from_env() -> Result<Self, KbError> {
        Self::new(KbConfig::from_env()?)
    }

    /// Wires explicit parts (in-memory store, custom providers).
    pub fn with_parts(
        cfg: KbConfig,
        store: Arc<dyn VectorStore>,
        providers: ProviderContext,
    ) -> Self {
        let cfg = Arc::new(cfg);
        let providers = Arc::new(providers);
        let indexer = IndexLifecycleManager::new(store.clone(), providers.clone(), cfg.clone());
        let retriever = HybridRetriever::new(store.clone(), providers, cfg.search.clone());
        Self {
            cfg,
            store,
            indexer,
            retriever,
        }
    }

    pub fn config(&self) -> &KbConfig {
        &self.cfg
    }

    /// Creates the collection if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), KbError> {
        self.indexer.ensure_collection().await.map(|_| ())
    }

    /// Indexes one file, replacing its previous chunks. Returns chunks written.
    pub async fn index_file(&self, path: impl AsRef<Path>) -> Result<usize, KbError> {
        self.indexer.index_file(path.as_ref()).await
    }

    /// Rebuilds all Markdown files under `dirs`.
    pub async fn index_full(&self, dirs: &[PathBuf]) -> Result<IndexReport, KbError> {
        self.indexer.index_full(dirs).await
    }

    /// Re-indexes changed paths; missing files are deleted from the index.
    pub async fn index_changed(&self, paths: &[PathBuf]) -> Result<IndexReport, KbError> {
        self.indexer.index_changed(paths).await
    }

    /// Incremental rebuild of the Markdown files git reports as changed
    /// (modified against `HEAD`, deleted, or untracked) in `repo_dir`.
    /// Doc paths are relative to the working tree unless `KB_ROOT` is set.
    ///
    /// # Errors
    /// `KbError::Git` when the repository cannot be read.
    pub async fn index_git_changes(&self, repo_dir: impl AsRef<Path>) -> Result<IndexReport, KbError> {
        let repo_dir = repo_dir.as_ref();
        let workdir =
            services::git::repo_workdir(repo_dir).map_err(|e| KbError::Git(e.to_string()))?;
        let changed = services::git::changed_markdown_files(repo_dir)
            .map_err(|e| KbError::Git(e.to_string()))?;
        let paths: Vec<PathBuf> = changed.into_iter().map(|c| c.path).collect();
        self.indexer.index_changed_under(&workdir, &paths).await
    }

    /// Encodes and upserts pre-built chunks.
    pub async fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<IndexReport, KbError> {
        self.indexer.index_chunks(chunks).await
    }

    /// Same as [`KnowledgeBase::index_chunks`] for a JSON array of chunks.
    ///
    /// # Errors
    /// `KbError::Json` when the input is not a chunk array.
    pub async fn index_chunks_json(&self, json: &str) -> Result<IndexReport, KbError> {
        let chunks: Vec<Chunk> = serde_json::from_str(json)?;
        self.indexer.index_chunks(chunks).await
    }

    pub async fn delete_doc(&self, doc_id: &str) -> Result<(), KbError> {
        self.indexer.delete_doc(doc_id).await
    }

    /// Deletes all chunks from one source repository; returns how many.
    pub async fn delete_by_source(&self, repo: &str) -> Result<u64, KbError> {
        self.indexer.delete_by_source(repo).await
    }

    /// Drops the whole collection. A missing collection is not an error.
    pub async fn drop_collection(&self) -> Result<(), KbError> {
        self.store.drop_collection().await?;
        info!(collection = %self.cfg.collection, "collection dropped");
        Ok(())
    }

    /// Collection counters plus a per-document summary built from the first
    /// [`STATUS_SAMPLE`] points.
    pub async fn status(&self) -> Result<StatusReport, KbError> {
        let stats = self.store.get_stats().await?;
        let points = self
            .store
            .scroll_by_filter(&StoreFilter::default(), STATUS_SAMPLE)
            .await?;

        let mut docs: BTreeMap<String, DocSummary> = BTreeMap::new();
        for (_, p) in &points {
            let entry = docs.entry(p.doc_id.clone()).or_insert_with(|| DocSummary {
                doc_id: p.doc_id.clone(),
                path: p.path.clone(),
                title: p.title.clone(),
                chunks: 0,
                has_sections: false,
            });
            entry.chunks += 1;
            entry.has_sections |= !p.section_path.is_empty();
        }
        debug!(points = points.len(), docs = docs.len(), "status sampled");

        Ok(StatusReport {
            collection: self.cfg.collection.clone(),
            stats,
            documents: docs.into_values().collect(),
            sampled_points: points.len(),
        })
    }

    /// Full-text match of `query` on chunk text, in store order.
    pub async fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<KeywordHit>, KbError> {
        trace!("KnowledgeBase::keyword_search top_k={top_k}");
        if filters::tokens(query).is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let hits = self
            .store
            .scroll_by_filter(&StoreFilter::text("text", query), top_k)
            .await?;
        Ok(hits
            .into_iter()
            .map(|(_, p)| KeywordHit {
                text: p.text.chars().take(KEYWORD_TEXT_CLAMP).collect(),
                doc_id: p.doc_id,
                chunk_id: p.chunk_id,
                path: p.path,
                title: p.title,
            })
            .collect())
    }

    /// Hybrid search. Backend failures are reported in
    /// [`SearchResponse::error`] rather than returned.
    pub async fn search(&self, req: &SearchRequest) -> SearchResponse {
        trace!("KnowledgeBase::search top_k={}", req.top_k);
        self.retriever.search(req).await
    }

    /// Hybrid search returning the error instead of folding it.
    pub async fn retrieve(&self, req: &SearchRequest) -> Result<Retrieved, RetrievalError> {
        self.retriever.retrieve(req).await
    }
}
