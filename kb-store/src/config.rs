//! Runtime and collection configuration, read from the environment.
//!
//! Environment variables used (a `.env` file in the working directory is
//! loaded first when present):
//! - `QDRANT_URL` (default: "http://localhost:6334")
//! - `QDRANT_API_KEY` (optional)
//! - `COLLECTION_NAME` (default: "knowledge_base")
//! - `QDRANT_DISTANCE` ("Cosine" | "Dot" | "Euclid"; default: "Cosine")
//! - `QDRANT_UPSERT_BATCH` (default: 500)
//! - `RAG_TOP_K` (default: 5)
//! - `RAG_MIN_SCORE` (optional; echoed, not enforced)
//! - `RAG_OVERSAMPLE` (default: 4)
//! - `RAG_FUSED_MULTIPLIER` (default: 3)
//! - `RAG_RRF_K` (default: 60)
//! - `RAG_RRF_PROTECT` (default: 3)
//! - `MAX_CHUNK_CHARS` (default: 3200)
//! - `DOC_ID_STRIP_PREFIXES` (comma-separated; default: "docs/")
//! - `KB_ROOT` (directory doc paths are relative to; default: working directory)
//! - `EMBEDDING_*`, `RERANKER_*`: see [`embed_service::config`]

use std::path::PathBuf;

use embed_service::{EmbeddingConfig, RerankConfig};
use md_chunker::{ChunkOptions, DEFAULT_MAX_CHUNK_CHARS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::KbError;

/// Distance function used for the dense vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// Parse from env string (case-insensitive). Defaults to Cosine.
    pub fn from_env(s: Option<String>) -> Self {
        match s
            .unwrap_or_else(|| "Cosine".to_string())
            .to_lowercase()
            .as_str()
        {
            "dot" | "dotproduct" => DistanceKind::Dot,
            "euclid" | "l2" => DistanceKind::Euclid,
            _ => DistanceKind::Cosine,
        }
    }
}

/// Knobs of the hybrid retriever.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Default number of results.
    pub top_k: usize,
    /// Accepted and echoed in responses; not used to drop results.
    pub min_score: Option<f32>,
    /// Each candidate list fetches `oversample * top_k` items.
    pub oversample: usize,
    /// Fused list is cut to `fused_multiplier * top_k` before reranking.
    pub fused_multiplier: usize,
    /// RRF smoothing constant.
    pub rrf_k: f32,
    /// How many fused leaders are kept ahead of everything else.
    pub rrf_protect: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: None,
            oversample: 4,
            fused_multiplier: 3,
            rrf_k: 60.0,
            rrf_protect: 3,
        }
    }
}

/// Configuration for indexing and retrieval.
#[derive(Clone, Debug)]
pub struct KbConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Distance function for the dense vector (Cosine by default).
    pub distance: DistanceKind,
    /// Points per upsert request.
    pub upsert_batch: usize,
    pub search: SearchSettings,
    pub chunk: ChunkOptions,
    pub embedding: EmbeddingConfig,
    /// `None` keeps the fused order instead of calling a reranker.
    pub rerank: Option<RerankConfig>,
}

impl KbConfig {
    /// Creates a sane default config for a given collection name and Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            distance: DistanceKind::Cosine,
            upsert_batch: 500,
            search: SearchSettings::default(),
            chunk: ChunkOptions::default(),
            embedding: EmbeddingConfig::default(),
            rerank: None,
        }
    }

    /// Builds configuration from environment variables (see module docs).
    ///
    /// # Errors
    /// `KbError::EnvParse` for unparsable numbers, `KbError::Config` for
    /// invalid combinations, `KbError::Provider` for provider settings.
    pub fn from_env() -> Result<Self, KbError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }

        let mut cfg = Self::new_default(
            env_or("QDRANT_URL", "http://localhost:6334"),
            env_or("COLLECTION_NAME", "knowledge_base"),
        );
        cfg.qdrant_api_key = env_opt("QDRANT_API_KEY");
        cfg.distance = DistanceKind::from_env(env_opt("QDRANT_DISTANCE"));
        cfg.upsert_batch = read_env("QDRANT_UPSERT_BATCH")?.unwrap_or(cfg.upsert_batch);

        let d = SearchSettings::default();
        cfg.search = SearchSettings {
            top_k: read_env("RAG_TOP_K")?.unwrap_or(d.top_k),
            min_score: read_env("RAG_MIN_SCORE")?,
            oversample: read_env("RAG_OVERSAMPLE")?.unwrap_or(d.oversample),
            fused_multiplier: read_env("RAG_FUSED_MULTIPLIER")?.unwrap_or(d.fused_multiplier),
            rrf_k: read_env("RAG_RRF_K")?.unwrap_or(d.rrf_k),
            rrf_protect: read_env("RAG_RRF_PROTECT")?.unwrap_or(d.rrf_protect),
        };

        cfg.chunk.max_chars = read_env("MAX_CHUNK_CHARS")?.unwrap_or(DEFAULT_MAX_CHUNK_CHARS);
        if let Some(list) = env_opt("DOC_ID_STRIP_PREFIXES") {
            cfg.chunk.strip_prefixes = parse_prefixes(&list);
        }
        cfg.chunk.root = env_opt("KB_ROOT").map(PathBuf::from);

        cfg.embedding = EmbeddingConfig::from_env()?;
        cfg.rerank = RerankConfig::from_env()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), KbError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(KbError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(KbError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(KbError::Config("upsert_batch must be > 0".into()));
        }
        if self.search.top_k == 0 {
            return Err(KbError::Config("RAG_TOP_K must be > 0".into()));
        }
        if self.search.oversample == 0 || self.search.fused_multiplier == 0 {
            return Err(KbError::Config(
                "RAG_OVERSAMPLE and RAG_FUSED_MULTIPLIER must be > 0".into(),
            ));
        }
        if !(self.search.rrf_k.is_finite() && self.search.rrf_k >= 0.0) {
            return Err(KbError::Config("RAG_RRF_K must be a non-negative number".into()));
        }
        if self.chunk.max_chars == 0 {
            return Err(KbError::Config("MAX_CHUNK_CHARS must be > 0".into()));
        }
        self.embedding.validate()?;
        Ok(())
    }
}

/// Splits a comma-separated prefix list, dropping blanks.
fn parse_prefixes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Read an optional value from env, with parse errors mapped to `KbError`.
fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, KbError> {
    match env_opt(key) {
        Some(v) => v.parse::<T>().map(Some).map_err(|_| KbError::EnvParse {
            key: key.into(),
            value: v,
        }),
        None => Ok(None),
    }
}
