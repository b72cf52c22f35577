//! In-process [`VectorStore`] for tests and offline runs.
//!
//! Dense similarity follows the collection distance (cosine by default),
//! sparse similarity is a dot product over shared indices, and full-text
//! filters use token containment. Ties are broken by point id so results
//! are deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use embed_service::SparseVector;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::DistanceKind;
use crate::errors::StoreError;
use crate::filters::StoreFilter;
use crate::record::{CandidateSource, SearchCandidate, StorePoint, StoreStats};
use crate::store::{ScrolledPoint, StoreFuture, VectorStore};

#[derive(Debug)]
struct Collection {
    dim: usize,
    distance: DistanceKind,
    sparse_enabled: bool,
    points: BTreeMap<String, StorePoint>,
}

/// Shared in-memory collection. Clones see the same data.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    name: String,
    inner: Arc<RwLock<Option<Collection>>>,
}

impl MemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            name: collection.into(),
            inner: Arc::new(RwLock::new(None)),
        }
    }

    fn missing(&self) -> StoreError {
        StoreError::MissingCollection(self.name.clone())
    }
}

fn dense_score(distance: DistanceKind, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match distance {
        DistanceKind::Dot => dot,
        DistanceKind::Cosine => {
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
        }
        DistanceKind::Euclid => {
            -a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        }
    }
}

/// Sorts by score descending, then point id ascending; assigns 1-based ranks.
fn rank(
    mut scored: Vec<(f32, &StorePoint)>,
    source: CandidateSource,
    limit: usize,
) -> Vec<SearchCandidate> {
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (score, p))| SearchCandidate {
            point_id: p.id.clone(),
            payload: p.payload.clone(),
            source,
            rank: i + 1,
            score,
        })
        .collect()
}

impl VectorStore for MemoryStore {
    fn collection(&self) -> &str {
        &self.name
    }

    fn create_collection(
        &self,
        dense_dim: usize,
        distance: DistanceKind,
        sparse_enabled: bool,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            if guard.is_none() {
                debug!(collection = %self.name, dense_dim, sparse_enabled, "memory collection created");
                *guard = Some(Collection {
                    dim: dense_dim,
                    distance,
                    sparse_enabled,
                    points: BTreeMap::new(),
                });
            }
            Ok(())
        })
    }

    fn upsert(&self, points: Vec<StorePoint>, batch_cap: usize) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            let coll = guard.as_mut().ok_or_else(|| self.missing())?;
            if let Some(bad) = points.iter().find(|p| p.dense.len() != coll.dim) {
                return Err(StoreError::VectorSizeMismatch {
                    got: bad.dense.len(),
                    want: coll.dim,
                });
            }
            trace!(points = points.len(), batch_cap, "memory upsert");
            let n = points.len();
            for mut p in points {
                if !coll.sparse_enabled {
                    p.sparse = None;
                }
                coll.points.insert(p.id.clone(), p);
            }
            Ok(n)
        })
    }

    fn delete_by_filter<'a>(&'a self, filter: &'a StoreFilter) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            let coll = guard.as_mut().ok_or_else(|| self.missing())?;
            let before = coll.points.len();
            coll.points.retain(|_, p| !filter.matches(&p.payload));
            debug!(removed = before - coll.points.len(), "memory delete_by_filter");
            Ok(())
        })
    }

    fn fused_query<'a>(
        &'a self,
        dense: &'a [f32],
        sparse: Option<&'a SparseVector>,
        prefetch_limit: usize,
        filter: Option<&'a StoreFilter>,
    ) -> StoreFuture<'a, Vec<SearchCandidate>> {
        Box::pin(async move {
            let guard = self.inner.read().await;
            let coll = guard.as_ref().ok_or_else(|| self.missing())?;
            if dense.len() != coll.dim {
                return Err(StoreError::VectorSizeMismatch {
                    got: dense.len(),
                    want: coll.dim,
                });
            }
            let visible: Vec<&StorePoint> = coll
                .points
                .values()
                .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
                .collect();

            let dense_scored = visible
                .iter()
                .map(|p| (dense_score(coll.distance, dense, &p.dense), *p))
                .collect();
            let mut out = rank(dense_scored, CandidateSource::Dense, prefetch_limit);

            if let Some(q) = sparse.filter(|_| coll.sparse_enabled) {
                let sparse_scored = visible
                    .iter()
                    .filter_map(|p| {
                        let s = p.sparse.as_ref().map(|v| v.dot(q))?;
                        (s > 0.0).then_some((s, *p))
                    })
                    .collect();
                out.extend(rank(sparse_scored, CandidateSource::Sparse, prefetch_limit));
            }
            Ok(out)
        })
    }

    fn scroll_by_filter<'a>(
        &'a self,
        filter: &'a StoreFilter,
        limit: usize,
    ) -> StoreFuture<'a, Vec<ScrolledPoint>> {
        Box::pin(async move {
            let guard = self.inner.read().await;
            let coll = guard.as_ref().ok_or_else(|| self.missing())?;
            Ok(coll
                .points
                .values()
                .filter(|p| filter.matches(&p.payload))
                .take(limit)
                .map(|p| (p.id.clone(), p.payload.clone()))
                .collect())
        })
    }

    fn count<'a>(&'a self, filter: Option<&'a StoreFilter>) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let guard = self.inner.read().await;
            let coll = guard.as_ref().ok_or_else(|| self.missing())?;
            let n = coll
                .points
                .values()
                .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
                .count();
            Ok(n as u64)
        })
    }

    fn get_stats(&self) -> StoreFuture<'_, StoreStats> {
        Box::pin(async move {
            let guard = self.inner.read().await;
            let coll = guard.as_ref().ok_or_else(|| self.missing())?;
            Ok(StoreStats {
                point_count: coll.points.len() as u64,
                status: "green".to_string(),
            })
        })
    }

    fn drop_collection(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            *self.inner.write().await = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ChunkPayload;

    fn point(id: &str, doc: &str, dense: Vec<f32>, sparse: Option<SparseVector>) -> StorePoint {
        StorePoint {
            id: id.into(),
            dense,
            sparse,
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

    fn sv(i: &[u32], v: &[f32]) -> SparseVector {
        SparseVector {
            indices: i.to_vec(),
            values: v.to_vec(),
        }
    }

    async fn seeded() -> MemoryStore {
        let s = MemoryStore::new("t");
        s.create_collection(2, DistanceKind::Cosine, true).await.unwrap();
        s.upsert(
            vec![
                point("p1", "a", vec![1.0, 0.0], Some(sv(&[1], &[1.0]))),
                point("p2", "b", vec![0.0, 1.0], Some(sv(&[2], &[1.0]))),
                point("p3", "c", vec![0.7, 0.7], None),
            ],
            10,
        )
        .await
        .unwrap();
        s
    }

    #[tokio::test]
    async fn missing_collection_errors_but_drop_is_ok() {
        let s = MemoryStore::new("t");
        assert!(matches!(s.count(None).await, Err(StoreError::MissingCollection(_))));
        s.drop_collection().await.unwrap();
    }

    #[tokio::test]
    async fn dense_then_sparse_lists_with_ranks() {
        let s = seeded().await;
        let q = sv(&[2], &[0.5]);
        let out = s.fused_query(&[1.0, 0.0], Some(&q), 10, None).await.unwrap();
        let dense: Vec<_> = out.iter().filter(|c| c.source == CandidateSource::Dense).collect();
        let sparse: Vec<_> = out.iter().filter(|c| c.source == CandidateSource::Sparse).collect();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense[0].point_id, "p1");
        assert_eq!(dense[0].rank, 1);
        assert_eq!(sparse.len(), 1);
        assert_eq!(sparse[0].point_id, "p2");
        assert_eq!(sparse[0].rank, 1);
    }

    #[tokio::test]
    async fn upsert_replaces_and_checks_dim() {
        let s = seeded().await;
        s.upsert(vec![point("p1", "a", vec![0.0, 1.0], None)], 10).await.unwrap();
        assert_eq!(s.count(None).await.unwrap(), 3);
        let err = s.upsert(vec![point("p9", "z", vec![1.0], None)], 10).await;
        assert!(matches!(err, Err(StoreError::VectorSizeMismatch { got: 1, want: 2 })));
    }

    #[tokio::test]
    async fn delete_and_count_by_filter() {
        let s = seeded().await;
        let f = StoreFilter::doc("b");
        assert_eq!(s.count(Some(&f)).await.unwrap(), 1);
        s.delete_by_filter(&f).await.unwrap();
        assert_eq!(s.count(Some(&f)).await.unwrap(), 0);
        assert_eq!(s.get_stats().await.unwrap().point_count, 2);
    }

    #[tokio::test]
    async fn scroll_applies_text_filter_and_limit() {
        let s = seeded().await;
        let all = s.scroll_by_filter(&StoreFilter::text("text", "text of"), 2).await.unwrap();
        assert_eq!(all.len(), 2);
        let one = s.scroll_by_filter(&StoreFilter::text("text", "c"), 10).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].0, "p3");
    }
}
