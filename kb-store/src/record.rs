//! Core data models: stored payload, candidates at each retrieval stage,
//! and the request/response shapes of the public entry points.

use std::collections::BTreeMap;

use embed_service::{Encoded, SparseVector};
use md_chunker::{Chunk, SECTION_PATH_SEPARATOR};
use serde::{Deserialize, Deserializer, Serialize};
use services::uuid::point_id;

use crate::retrieve::QueryMode;

/// Canonical payload stored with every point.
///
/// `section_path` is persisted as the list of titles. Payloads written with
/// the titles joined by `" > "` are still read back as a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub doc_id: String,
    pub chunk_id: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "de_section_path")]
    pub section_path: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_repo: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub source_commit: String,
}

impl ChunkPayload {
    pub fn section_path_string(&self) -> String {
        self.section_path.join(SECTION_PATH_SEPARATOR)
    }

    /// Text given to the reranker: title line plus body.
    pub fn rerank_text(&self) -> String {
        if self.title.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n{}", self.title, self.text)
        }
    }
}

impl From<&Chunk> for ChunkPayload {
    fn from(c: &Chunk) -> Self {
        Self {
            doc_id: c.doc_id.clone(),
            chunk_id: c.chunk_id.clone(),
            chunk_index: c.chunk_index,
            path: c.path.clone(),
            title: c.title.clone(),
            section_path: c.section_path.clone(),
            text: c.text.clone(),
            confidence: c.confidence.clone(),
            tags: c.tags.clone(),
            source_repo: c.source_repo.clone(),
            source_path: c.source_path.clone(),
            source_commit: c.source_commit.clone(),
        }
    }
}

fn de_section_path<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
        Null(()),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Joined(s) if s.trim().is_empty() => Vec::new(),
        Raw::Joined(s) => s
            .split(SECTION_PATH_SEPARATOR)
            .map(str::to_string)
            .collect(),
        Raw::List(v) => v,
        Raw::Null(()) => Vec::new(),
    })
}

/// A chunk together with its vectors, ready for upsert.
#[derive(Clone, Debug)]
pub struct EncodedChunk {
    pub chunk: Chunk,
    pub encoded: Encoded,
}

impl EncodedChunk {
    /// Converts into a store point keyed by the UUIDv5 of `chunk_id`.
    pub fn into_point(self) -> StorePoint {
        StorePoint {
            id: point_id(&self.chunk.chunk_id),
            payload: ChunkPayload::from(&self.chunk),
            dense: self.encoded.dense,
            sparse: self.encoded.sparse,
        }
    }
}

/// One point as written to the store.
#[derive(Clone, Debug, PartialEq)]
pub struct StorePoint {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub payload: ChunkPayload,
}

/// Which ranked list a candidate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Dense,
    Sparse,
    Lexical,
}

/// A candidate as returned by one ranked list.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchCandidate {
    pub point_id: String,
    pub payload: ChunkPayload,
    pub source: CandidateSource,
    /// 1-based position within its list.
    pub rank: usize,
    /// Raw similarity reported by the list (not comparable across lists).
    pub score: f32,
}

/// A candidate after RRF fusion.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedCandidate {
    pub point_id: String,
    pub payload: ChunkPayload,
    pub rrf_score: f32,
}

/// Final ranked result.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedResult {
    pub point_id: String,
    pub payload: ChunkPayload,
    pub rerank_score: f32,
    pub rrf_score: f32,
}

/// Input of a hybrid search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    /// Accepted and echoed; results are not filtered by it.
    #[serde(default)]
    pub min_score: Option<f32>,
    /// Restricts results to paths containing `/{scope}/` (e.g. `runbook`).
    #[serde(default)]
    pub scope: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            min_score: None,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// One serialized search result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Rerank score rounded to 4 decimals.
    pub score: f32,
    pub rrf_score: f32,
    pub doc_id: String,
    pub chunk_id: String,
    pub chunk_index: usize,
    pub path: String,
    pub title: String,
    pub section_path: String,
    pub confidence: String,
    pub text: String,
}

impl From<&RankedResult> for SearchHit {
    fn from(r: &RankedResult) -> Self {
        let p = &r.payload;
        Self {
            score: round4(r.rerank_score),
            rrf_score: r.rrf_score,
            doc_id: p.doc_id.clone(),
            chunk_id: p.chunk_id.clone(),
            chunk_index: p.chunk_index,
            path: p.path.clone(),
            title: p.title.clone(),
            section_path: p.section_path_string(),
            confidence: p.confidence.clone(),
            text: p.text.clone(),
        }
    }
}

pub(crate) fn round4(x: f32) -> f32 {
    (x * 10_000.0).round() / 10_000.0
}

/// Advisory attached to every non-error search response.
pub const SEARCH_NOTE: &str = "[SEARCH NOTE] The results above are document fragments (chunks) \
and may be incomplete. If a chunk lacks the steps, commands, configuration or code needed to \
answer, read the file at `path` for the full context instead of filling gaps from general \
knowledge.";

/// Output of a hybrid search. Backend failures come back in `error` with no results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<QueryMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn ok(req: &SearchRequest, mode: QueryMode, ranked: &[RankedResult]) -> Self {
        Self {
            query: req.query.clone(),
            mode: Some(mode),
            min_score: req.min_score,
            results: ranked.iter().map(SearchHit::from).collect(),
            note: Some(SEARCH_NOTE.to_string()),
            error: None,
        }
    }

    pub fn failed(req: &SearchRequest, error: impl ToString) -> Self {
        Self {
            query: req.query.clone(),
            mode: None,
            min_score: req.min_score,
            results: Vec::new(),
            note: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Keyword (full-text) search hit; `text` is clamped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub doc_id: String,
    pub chunk_id: String,
    pub path: String,
    pub title: String,
    pub text: String,
}

/// Collection-level counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub point_count: u64,
    pub status: String,
}

/// Per-document summary in a status report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSummary {
    pub doc_id: String,
    pub path: String,
    pub title: String,
    pub chunks: usize,
    /// Whether any chunk sits under a heading.
    pub has_sections: bool,
}

/// Output of `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub collection: String,
    pub stats: StoreStats,
    /// Documents found in the sampled points, by doc id.
    pub documents: Vec<DocSummary>,
    /// Points inspected to build `documents`.
    pub sampled_points: usize,
}

/// Outcome of an indexing run; documents succeed or fail independently.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// doc id -> chunks written
    pub indexed: BTreeMap<String, usize>,
    /// doc id -> error message
    pub failed: BTreeMap<String, String>,
    /// path -> parse error for files that were skipped
    pub skipped: BTreeMap<String, String>,
    /// doc ids removed because their file is gone
    pub deleted: Vec<String>,
}

impl IndexReport {
    pub fn chunks_indexed(&self) -> usize {
        self.indexed.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}
