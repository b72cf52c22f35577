//! Vector store contract shared by the Qdrant adapter and the in-memory store.

use embed_service::SparseVector;
use futures::future::BoxFuture;

use crate::config::DistanceKind;
use crate::errors::StoreError;
use crate::filters::StoreFilter;
use crate::record::{ChunkPayload, SearchCandidate, StoreStats, StorePoint};

/// Boxed future returned by [`VectorStore`] methods (keeps the trait object-safe).
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

/// Named vector holding dense embeddings.
pub const DENSE_VECTOR: &str = "dense";
/// Named vector holding sparse lexical weights.
pub const SPARSE_VECTOR: &str = "sparse";

/// A point id with its payload, as returned by filtered scrolls.
pub type ScrolledPoint = (String, ChunkPayload);

/// Storage backend for chunk points.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// concurrently. Queries against a missing collection fail with
/// [`StoreError::MissingCollection`] (or the backend's equivalent).
pub trait VectorStore: Send + Sync {
    /// Collection this store reads and writes.
    fn collection(&self) -> &str;

    /// Creates the collection if missing; an existing one is left untouched.
    fn create_collection(
        &self,
        dense_dim: usize,
        distance: DistanceKind,
        sparse_enabled: bool,
    ) -> StoreFuture<'_, ()>;

    /// Inserts or replaces points, at most `batch_cap` per request.
    /// Returns the number of points written.
    fn upsert(&self, points: Vec<StorePoint>, batch_cap: usize) -> StoreFuture<'_, usize>;

    fn delete_by_filter<'a>(&'a self, filter: &'a StoreFilter) -> StoreFuture<'a, ()>;

    /// Runs one ranked query per available vector (dense, then sparse when
    /// given), each limited to `prefetch_limit`.
    ///
    /// Candidates come back concatenated in list order, each tagged with its
    /// source and 1-based rank. Fusion is left to the caller.
    fn fused_query<'a>(
        &'a self,
        dense: &'a [f32],
        sparse: Option<&'a SparseVector>,
        prefetch_limit: usize,
        filter: Option<&'a StoreFilter>,
    ) -> StoreFuture<'a, Vec<SearchCandidate>>;

    /// Points matching `filter`, in store order, at most `limit`.
    fn scroll_by_filter<'a>(
        &'a self,
        filter: &'a StoreFilter,
        limit: usize,
    ) -> StoreFuture<'a, Vec<ScrolledPoint>>;

    /// Exact number of points matching `filter` (all points when `None`).
    fn count<'a>(&'a self, filter: Option<&'a StoreFilter>) -> StoreFuture<'a, u64>;

    fn get_stats(&self) -> StoreFuture<'_, StoreStats>;

    /// Drops the collection. A missing collection is not an error.
    fn drop_collection(&self) -> StoreFuture<'_, ()>;
}
