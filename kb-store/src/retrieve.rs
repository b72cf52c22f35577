//! Hybrid retrieval: query encoding, per-list candidate retrieval, RRF
//! fusion, reranking and top-N protection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use embed_service::{ProviderContext, ProviderError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::config::SearchSettings;
use crate::errors::RetrievalError;
use crate::filters::{StoreFilter, tokens};
use crate::fusion::rrf_fuse;
use crate::record::{CandidateSource, RankedResult, SearchCandidate, SearchRequest, SearchResponse};
use crate::store::VectorStore;

/// Which candidate lists fed the fusion. Chosen once per query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Dense vector list + sparse vector list.
    DenseSparse,
    /// No sparse query vector; dense list + full-text match on `text`.
    DenseLexical,
    /// No sparse vector and no full-text match.
    DenseOnly,
}

/// Ranked results of one query and the mode that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct Retrieved {
    pub mode: QueryMode,
    pub results: Vec<RankedResult>,
}

pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    providers: Arc<ProviderContext>,
    settings: SearchSettings,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        providers: Arc<ProviderContext>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            store,
            providers,
            settings,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Runs a hybrid query and folds any backend error into the response.
    pub async fn search(&self, req: &SearchRequest) -> SearchResponse {
        match self.retrieve(req).await {
            Ok(r) => SearchResponse::ok(req, r.mode, &r.results),
            Err(e) => {
                error!(query = %req.query, error = %e, "hybrid search failed");
                SearchResponse::failed(req, e)
            }
        }
    }

    /// Runs a hybrid query.
    ///
    /// A `top_k` of zero falls back to the configured default.
    pub async fn retrieve(&self, req: &SearchRequest) -> Result<Retrieved, RetrievalError> {
        let started = Instant::now();
        let top_k = if req.top_k == 0 {
            self.settings.top_k
        } else {
            req.top_k
        };
        let prefetch = self.settings.oversample.saturating_mul(top_k).max(1);
        trace!(query = %req.query, top_k, prefetch, scope = ?req.scope, "retrieve");

        let embedder = self
            .providers
            .embedder()
            .await
            .map_err(RetrievalError::Encode)?;
        let encoded = embedder
            .encode_query(&req.query)
            .await
            .map_err(RetrievalError::Encode)?;

        let scope = StoreFilter::default().with_scope(req.scope.as_deref());
        let scope_ref = (!scope.is_empty()).then_some(&scope);
        let sparse = encoded.sparse.as_ref().filter(|s| !s.is_empty());

        let mut candidates = self
            .store
            .fused_query(&encoded.dense, sparse, prefetch, scope_ref)
            .await?;

        let mode = if sparse.is_some() {
            QueryMode::DenseSparse
        } else {
            let lexical = self.lexical_list(&req.query, &scope, prefetch).await?;
            if lexical.is_empty() {
                QueryMode::DenseOnly
            } else {
                candidates.extend(lexical);
                QueryMode::DenseLexical
            }
        };
        debug!(?mode, candidates = candidates.len(), "candidate lists collected");

        let mut fused = rrf_fuse(&candidates, self.settings.rrf_k);
        fused.truncate(self.settings.fused_multiplier.saturating_mul(top_k));
        if fused.is_empty() {
            info!(?mode, latency_ms = started.elapsed().as_millis() as u64, "no candidates");
            return Ok(Retrieved {
                mode,
                results: Vec::new(),
            });
        }

        let pairs: Vec<(String, String)> = fused
            .iter()
            .map(|c| (req.query.clone(), c.payload.rerank_text()))
            .collect();
        let reranker = self
            .providers
            .reranker()
            .await
            .map_err(RetrievalError::Rerank)?;
        let scores = reranker
            .score_pairs(&pairs)
            .await
            .map_err(RetrievalError::Rerank)?;
        if scores.len() != fused.len() {
            return Err(RetrievalError::Rerank(ProviderError::CountMismatch {
                expected: fused.len(),
                got: scores.len(),
            }));
        }

        let ranked: Vec<RankedResult> = fused
            .into_iter()
            .zip(scores)
            .map(|(c, s)| RankedResult {
                point_id: c.point_id,
                payload: c.payload,
                rerank_score: s,
                rrf_score: c.rrf_score,
            })
            .collect();

        let mut results = dedupe_by_point(apply_protection(ranked, self.settings.rrf_protect));
        results.truncate(top_k);

        info!(
            ?mode,
            reranker = reranker.name(),
            results = results.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "hybrid search done"
        );
        Ok(Retrieved { mode, results })
    }

    /// Full-text match of the query on `text`, ranked by scroll order.
    async fn lexical_list(
        &self,
        query: &str,
        scope: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, RetrievalError> {
        if tokens(query).is_empty() {
            return Ok(Vec::new());
        }
        let filter = scope.clone().and_text("text", query);
        let hits = self.store.scroll_by_filter(&filter, limit).await?;
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, (point_id, payload))| SearchCandidate {
                point_id,
                payload,
                source: CandidateSource::Lexical,
                rank: i + 1,
                score: 0.0,
            })
            .collect())
    }
}

/// Keeps the first `protect` fused results ahead of the rest.
///
/// The protected prefix and the remainder are each reordered by rerank score
/// (descending, stable), then concatenated prefix first.
pub fn apply_protection(mut ranked: Vec<RankedResult>, protect: usize) -> Vec<RankedResult> {
    let mut rest = ranked.split_off(protect.min(ranked.len()));
    ranked.sort_by(|a, b| b.rerank_score.total_cmp(&a.rerank_score));
    rest.sort_by(|a, b| b.rerank_score.total_cmp(&a.rerank_score));
    ranked.extend(rest);
    ranked
}

/// Drops repeated point ids; the first occurrence wins.
pub fn dedupe_by_point(ranked: Vec<RankedResult>) -> Vec<RankedResult> {
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|r| seen.insert(r.point_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceKind;
    use crate::memory_store::MemoryStore;
    use crate::test_support::{StubEmbedder, TitleReranker, point};
    use embed_service::SparseVector;

    fn ranked(id: &str, rerank: f32) -> RankedResult {
        RankedResult {
            point_id: id.into(),
            payload: point(id, "x", vec![0.0]).payload,
            rerank_score: rerank,
            rrf_score: 0.0,
        }
    }

    fn ids(r: &[RankedResult]) -> Vec<&str> {
        r.iter().map(|x| x.point_id.as_str()).collect()
    }

    #[test]
    fn protection_sorts_prefix_and_rest_separately() {
        let input = vec![
            ranked("a", 0.1),
            ranked("b", 0.9),
            ranked("c", 0.5),
            ranked("d", 0.99),
            ranked("e", 0.2),
        ];
        let out = apply_protection(input, 3);
        assert_eq!(ids(&out), vec!["b", "c", "a", "d", "e"]);
    }

    #[test]
    fn protection_larger_than_list_and_zero() {
        let input = vec![ranked("a", 0.1), ranked("b", 0.9)];
        assert_eq!(ids(&apply_protection(input.clone(), 10)), vec!["b", "a"]);
        assert_eq!(ids(&apply_protection(input, 0)), vec!["b", "a"]);
    }

    #[test]
    fn protection_is_stable_on_equal_scores() {
        let input = vec![ranked("a", 0.5), ranked("b", 0.5), ranked("c", 0.5)];
        assert_eq!(ids(&apply_protection(input, 2)), vec!["a", "b", "c"]);
    }

    #[test]
    fn dedupe_keeps_first() {
        let input = vec![ranked("a", 0.1), ranked("b", 0.9), ranked("a", 0.99)];
        let out = dedupe_by_point(input);
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert!((out[0].rerank_score - 0.1).abs() < 1e-6);
    }

    /// Eight points at growing angles from the x axis; `p0` is nearest.
    async fn fan_store() -> MemoryStore {
        let store = MemoryStore::new("t");
        store
            .create_collection(2, DistanceKind::Cosine, true)
            .await
            .unwrap();
        let pts = (0..8)
            .map(|i| {
                let a = i as f32 * 0.15;
                let mut p = point(&format!("p{i}"), &format!("doc{i}"), vec![a.cos(), a.sin()]);
                p.payload.text = format!("chunk number {i} about topic{i}");
                p
            })
            .collect();
        store.upsert(pts, 100).await.unwrap();
        store
    }

    fn retriever(store: MemoryStore, embedder: StubEmbedder, reranker: TitleReranker) -> HybridRetriever {
        let ctx = ProviderContext::with_providers(Arc::new(embedder), Arc::new(reranker));
        HybridRetriever::new(Arc::new(store), Arc::new(ctx), SearchSettings::default())
    }

    #[tokio::test]
    async fn top_fused_result_survives_a_low_rerank_score() {
        // p0 is the best dense match but gets the lowest rerank score.
        let reranker = TitleReranker::new(&[
            ("doc0", 0.01),
            ("doc1", 0.2),
            ("doc2", 0.3),
            ("doc3", 0.9),
            ("doc4", 0.95),
            ("doc5", 0.97),
        ]);
        let r = retriever(fan_store().await, StubEmbedder::dense(vec![1.0, 0.0]), reranker);
        let out = r.retrieve(&SearchRequest::new("zzz", 3)).await.unwrap();
        assert_eq!(out.mode, QueryMode::DenseOnly);
        assert_eq!(ids(&out.results), vec!["p2", "p1", "p0"]);
    }

    #[tokio::test]
    async fn without_protection_rerank_order_wins() {
        let reranker = TitleReranker::new(&[("doc0", 0.01), ("doc5", 0.97), ("doc4", 0.95)]);
        let ctx = ProviderContext::with_providers(
            Arc::new(StubEmbedder::dense(vec![1.0, 0.0])),
            Arc::new(reranker),
        );
        let settings = SearchSettings {
            rrf_protect: 0,
            ..SearchSettings::default()
        };
        let r = HybridRetriever::new(Arc::new(fan_store().await), Arc::new(ctx), settings);
        let out = r.retrieve(&SearchRequest::new("zzz", 2)).await.unwrap();
        assert_eq!(ids(&out.results), vec!["p5", "p4"]);
    }

    #[tokio::test]
    async fn lexical_list_is_used_without_sparse_vectors() {
        let r = retriever(
            fan_store().await,
            StubEmbedder::dense(vec![1.0, 0.0]),
            TitleReranker::new(&[]),
        );
        let out = r.retrieve(&SearchRequest::new("topic7", 3)).await.unwrap();
        assert_eq!(out.mode, QueryMode::DenseLexical);
        // p7 is last on the dense list but first on the lexical one.
        assert!(ids(&out.results).contains(&"p7"));
    }

    #[tokio::test]
    async fn sparse_vectors_select_dense_sparse_mode() {
        let embedder = StubEmbedder {
            dense: vec![1.0, 0.0],
            sparse: Some(SparseVector {
                indices: vec![1],
                values: vec![1.0],
            }),
        };
        let r = retriever(fan_store().await, embedder, TitleReranker::new(&[]));
        let out = r.retrieve(&SearchRequest::new("anything", 5)).await.unwrap();
        assert_eq!(out.mode, QueryMode::DenseSparse);
        assert_eq!(out.results.len(), 5);
    }

    #[tokio::test]
    async fn results_never_repeat_and_respect_top_k() {
        let r = retriever(
            fan_store().await,
            StubEmbedder::dense(vec![1.0, 0.0]),
            TitleReranker::new(&[]),
        );
        let out = r.retrieve(&SearchRequest::new("chunk number", 4)).await.unwrap();
        assert_eq!(out.results.len(), 4);
        let unique: HashSet<_> = out.results.iter().map(|x| &x.point_id).collect();
        assert_eq!(unique.len(), 4);
    }

    #[tokio::test]
    async fn huge_top_k_returns_everything() {
        let r = retriever(
            fan_store().await,
            StubEmbedder::dense(vec![1.0, 0.0]),
            TitleReranker::new(&[]),
        );
        let out = r
            .retrieve(&SearchRequest::new("chunk number", usize::MAX))
            .await
            .unwrap();
        assert_eq!(out.results.len(), 8);
    }

    #[tokio::test]
    async fn scope_restricts_paths() {
        let store = fan_store().await;
        let mut adr = point("q1", "adr-doc", vec![1.0, 0.0]);
        adr.payload.path = "docs/adr/0001.md".into();
        store.upsert(vec![adr], 10).await.unwrap();
        let r = retriever(store, StubEmbedder::dense(vec![1.0, 0.0]), TitleReranker::new(&[]));
        let out = r
            .retrieve(&SearchRequest::new("zzz", 5).with_scope("adr"))
            .await
            .unwrap();
        assert_eq!(ids(&out.results), vec!["q1"]);
    }

    #[tokio::test]
    async fn store_failure_is_folded_into_the_response() {
        let r = retriever(
            MemoryStore::new("missing"),
            StubEmbedder::dense(vec![1.0, 0.0]),
            TitleReranker::new(&[]),
        );
        let resp = r.search(&SearchRequest::new("q", 5)).await;
        assert!(resp.is_error());
        assert!(resp.results.is_empty());
        assert!(resp.note.is_none());
    }

    #[tokio::test]
    async fn empty_collection_is_an_empty_success() {
        let store = MemoryStore::new("t");
        store
            .create_collection(2, DistanceKind::Cosine, true)
            .await
            .unwrap();
        let r = retriever(store, StubEmbedder::dense(vec![1.0, 0.0]), TitleReranker::new(&[]));
        let resp = r.search(&SearchRequest::new("q", 5)).await;
        assert!(!resp.is_error());
        assert!(resp.results.is_empty());
        assert!(resp.note.is_some());
    }

    #[tokio::test]
    async fn rerank_count_mismatch_is_an_error() {
        let r = retriever(
            fan_store().await,
            StubEmbedder::dense(vec![1.0, 0.0]),
            TitleReranker::short(),
        );
        let err = r.retrieve(&SearchRequest::new("zzz", 3)).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Rerank(ProviderError::CountMismatch { .. })
        ));
    }
}
