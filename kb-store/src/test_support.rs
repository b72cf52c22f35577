//! Deterministic providers and fixtures shared by unit tests.

use std::collections::HashMap;

use embed_service::{
    EmbeddingProvider, Encoded, ProviderFuture, RerankProvider, SparseVector,
};

use crate::record::{ChunkPayload, StorePoint};

/// A point of document `doc` at `docs/runbook/{doc}.md`, titled `doc`.
pub fn point(id: &str, doc: &str, dense: Vec<f32>) -> StorePoint {
    StorePoint {
        id: id.into(),
        dense,
        sparse: None,
        payload: ChunkPayload {
            doc_id: doc.into(),
            chunk_id: format!("{doc}-000"),
            chunk_index: 0,
            path: format!("docs/runbook/{doc}.md"),
            title: doc.into(),
            section_path: vec![],
            text: format!("text of {doc}"),
            confidence: "unknown".into(),
            tags: vec![],
            source_repo: String::new(),
            source_path: String::new(),
            source_commit: String::new(),
        },
    }
}

/// Encodes every text to the same vectors.
pub struct StubEmbedder {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
}

impl StubEmbedder {
    pub fn dense(dense: Vec<f32>) -> Self {
        Self {
            dense,
            sparse: None,
        }
    }

    fn encoded(&self) -> Encoded {
        Encoded {
            dense: self.dense.clone(),
            sparse: self.sparse.clone(),
        }
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn dim(&self) -> usize {
        self.dense.len()
    }

    fn encode_documents<'a>(
        &'a self,
        texts: &'a [String],
        _batch_size: usize,
    ) -> ProviderFuture<'a, Vec<Encoded>> {
        Box::pin(async move { Ok(texts.iter().map(|_| self.encoded()).collect()) })
    }

    fn encode_query<'a>(&'a self, _text: &'a str) -> ProviderFuture<'a, Encoded> {
        Box::pin(async move { Ok(self.encoded()) })
    }
}

/// Scores a passage by its first line (the title); unknown titles score 0.
pub struct TitleReranker {
    scores: HashMap<String, f32>,
    drop_last: bool,
}

impl TitleReranker {
    pub fn new(scores: &[(&str, f32)]) -> Self {
        Self {
            scores: scores.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            drop_last: false,
        }
    }

    /// Returns one score fewer than asked for.
    pub fn short() -> Self {
        Self {
            scores: HashMap::new(),
            drop_last: true,
        }
    }
}

impl RerankProvider for TitleReranker {
    fn name(&self) -> &'static str {
        "title"
    }

    fn score_pairs<'a>(&'a self, pairs: &'a [(String, String)]) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(async move {
            let mut out: Vec<f32> = pairs
                .iter()
                .map(|(_, passage)| {
                    let title = passage.lines().next().unwrap_or_default();
                    self.scores.get(title).copied().unwrap_or(0.0)
                })
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        })
    }
}
