//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! All Qdrant interactions live behind [`QdrantStore`], which implements
//! [`VectorStore`]. Collections carry two named vectors (`dense`, `sparse`)
//! and payload indexes for the fields that filters touch.

use std::collections::HashMap;

use embed_service::SparseVector;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, ListValue, NamedVectors, PointId, PointStruct,
    Query, QueryPointsBuilder, ScrollPointsBuilder, SparseVectorParamsBuilder,
    SparseVectorsConfigBuilder, Struct, TextIndexParamsBuilder, TokenizerType,
    UpsertPointsBuilder, Value as QValue, Vector, VectorInput, VectorParamsBuilder,
    VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, error, info, trace, warn};

use crate::config::{DistanceKind, KbConfig};
use crate::errors::{KbError, StoreError};
use crate::filters::{StoreFilter, to_qdrant_filter};
use crate::record::{CandidateSource, ChunkPayload, SearchCandidate, StorePoint, StoreStats};
use crate::store::{DENSE_VECTOR, SPARSE_VECTOR, ScrolledPoint, StoreFuture, VectorStore};

/// Payload fields indexed as exact keywords.
const KEYWORD_FIELDS: [&str; 2] = ["doc_id", "source_repo"];
/// Payload fields indexed for full-text matching.
const TEXT_FIELDS: [&str; 2] = ["text", "path"];

/// A facade over the Qdrant client to keep the rest of the code clean and stable.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

fn qerr(e: impl std::fmt::Display) -> StoreError {
    StoreError::Qdrant(e.to_string())
}

impl QdrantStore {
    /// Creates a new facade from the given configuration.
    ///
    /// Supports optional API key authentication. No request is made here.
    pub fn new(cfg: &KbConfig) -> Result<Self, KbError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build().map_err(qerr)?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
        })
    }

    async fn create_indexes(&self) -> Result<(), StoreError> {
        for field in KEYWORD_FIELDS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(qerr)?;
        }
        for field in TEXT_FIELDS {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(&self.collection, field, FieldType::Text)
                        .field_index_params(
                            TextIndexParamsBuilder::new(TokenizerType::Multilingual)
                                .lowercase(true),
                        ),
                )
                .await
                .map_err(qerr)?;
        }
        debug!(collection = %self.collection, "payload indexes created");
        Ok(())
    }

    async fn query_list(
        &self,
        query: Query,
        using: &str,
        source: CandidateSource,
        limit: usize,
        filter: Option<&StoreFilter>,
    ) -> Result<Vec<SearchCandidate>, StoreError> {
        let mut builder = QueryPointsBuilder::new(&self.collection)
            .query(query)
            .using(using)
            .limit(limit as u64)
            .with_payload(true);
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            builder = builder.filter(to_qdrant_filter(f));
        }

        let res = self.client.query(builder).await.map_err(|e| {
            error!(collection = %self.collection, using, error = %e, "qdrant query failed");
            qerr(e)
        })?;

        let mut out = Vec::with_capacity(res.result.len());
        for (i, p) in res.result.into_iter().enumerate() {
            out.push(SearchCandidate {
                point_id: point_id_string(p.id),
                payload: payload_from_qdrant(p.payload)?,
                source,
                rank: i + 1,
                score: p.score,
            });
        }
        trace!(using, hits = out.len(), "qdrant query list");
        Ok(out)
    }
}

impl VectorStore for QdrantStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    /// Ensures that the collection exists.
    ///
    /// - If the collection already exists → no-op.
    /// - If missing → creates `dense` (+ `sparse`) vectors and payload indexes.
    fn create_collection(
        &self,
        dense_dim: usize,
        distance: DistanceKind,
        sparse_enabled: bool,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            info!(
                "Ensuring collection '{}' with size={} distance={:?} sparse={}",
                self.collection, dense_dim, distance, sparse_enabled
            );

            if self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(qerr)?
            {
                debug!("Collection '{}' already exists", self.collection);
                return Ok(());
            }

            let distance = match distance {
                DistanceKind::Cosine => Distance::Cosine,
                DistanceKind::Dot => Distance::Dot,
                DistanceKind::Euclid => Distance::Euclid,
            };

            let mut vectors = VectorsConfigBuilder::default();
            vectors.add_named_vector_params(
                DENSE_VECTOR,
                VectorParamsBuilder::new(dense_dim as u64, distance),
            );
            let mut builder = CreateCollectionBuilder::new(&self.collection).vectors_config(vectors);
            if sparse_enabled {
                let mut sparse = SparseVectorsConfigBuilder::default();
                sparse.add_named_vector_params(SPARSE_VECTOR, SparseVectorParamsBuilder::default());
                builder = builder.sparse_vectors_config(sparse);
            }

            self.client.create_collection(builder).await.map_err(qerr)?;
            self.create_indexes().await?;

            info!("Collection '{}' created successfully", self.collection);
            Ok(())
        })
    }

    /// Upserts points in batches of `batch_cap`; waits for each batch to apply.
    fn upsert(&self, points: Vec<StorePoint>, batch_cap: usize) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            if points.is_empty() {
                debug!("No points provided for upsert");
                return Ok(0);
            }

            info!(
                "Upserting {} points into collection '{}'",
                points.len(),
                self.collection
            );

            let mut written = 0usize;
            for batch in points.chunks(batch_cap.max(1)) {
                let structs = batch
                    .iter()
                    .map(to_point_struct)
                    .collect::<Result<Vec<_>, _>>()?;
                let n = structs.len();
                let res = self
                    .client
                    .upsert_points(UpsertPointsBuilder::new(&self.collection, structs).wait(true))
                    .await
                    .map_err(qerr)?;
                debug!("Upsert operation result={:?}", res.result);
                written += n;
            }
            Ok(written)
        })
    }

    fn delete_by_filter<'a>(&'a self, filter: &'a StoreFilter) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection)
                        .points(to_qdrant_filter(filter))
                        .wait(true),
                )
                .await
                .map_err(qerr)?;
            debug!(collection = %self.collection, "points deleted by filter");
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
            let mut out = self
                .query_list(
                    Query::new_nearest(dense.to_vec()),
                    DENSE_VECTOR,
                    CandidateSource::Dense,
                    prefetch_limit,
                    filter,
                )
                .await?;
            if let Some(s) = sparse.filter(|s| !s.is_empty()) {
                let input = VectorInput::new_sparse(s.indices.clone(), s.values.clone());
                out.extend(
                    self.query_list(
                        Query::new_nearest(input),
                        SPARSE_VECTOR,
                        CandidateSource::Sparse,
                        prefetch_limit,
                        filter,
                    )
                    .await?,
                );
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
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(limit.min(u32::MAX as usize) as u32)
                .with_payload(true)
                .with_vectors(false);
            if !filter.is_empty() {
                builder = builder.filter(to_qdrant_filter(filter));
            }
            let res = self.client.scroll(builder).await.map_err(qerr)?;
            res.result
                .into_iter()
                .map(|p| Ok((point_id_string(p.id), payload_from_qdrant(p.payload)?)))
                .collect()
        })
    }

    fn count<'a>(&'a self, filter: Option<&'a StoreFilter>) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut builder = CountPointsBuilder::new(&self.collection).exact(true);
            if let Some(f) = filter.filter(|f| !f.is_empty()) {
                builder = builder.filter(to_qdrant_filter(f));
            }
            let res = self.client.count(builder).await.map_err(qerr)?;
            Ok(res.result.map(|r| r.count).unwrap_or(0))
        })
    }

    fn get_stats(&self) -> StoreFuture<'_, StoreStats> {
        Box::pin(async move {
            let res = self
                .client
                .collection_info(&self.collection)
                .await
                .map_err(qerr)?;
            let info = res
                .result
                .ok_or_else(|| StoreError::MissingCollection(self.collection.clone()))?;
            Ok(StoreStats {
                point_count: info.points_count.unwrap_or(0),
                status: info.status().as_str_name().to_lowercase(),
            })
        })
    }

    fn drop_collection(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if !self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(qerr)?
            {
                warn!("Collection '{}' does not exist, nothing to drop", self.collection);
                return Ok(());
            }
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(qerr)?;
            info!("Collection '{}' dropped", self.collection);
            Ok(())
        })
    }
}

fn to_point_struct(p: &StorePoint) -> Result<PointStruct, StoreError> {
    let mut vectors =
        NamedVectors::default().add_vector(DENSE_VECTOR, Vector::new_dense(p.dense.clone()));
    if let Some(s) = p.sparse.as_ref().filter(|s| !s.is_empty()) {
        vectors = vectors.add_vector(
            SPARSE_VECTOR,
            Vector::new_sparse(s.indices.clone(), s.values.clone()),
        );
    }
    let json = serde_json::to_value(&p.payload).map_err(|e| StoreError::Payload(e.to_string()))?;
    let payload = Payload::try_from(json).map_err(|e| StoreError::Payload(e.to_string()))?;
    Ok(PointStruct::new(p.id.clone(), vectors, payload))
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn payload_from_qdrant(p: HashMap<String, QValue>) -> Result<ChunkPayload, StoreError> {
    serde_json::from_value(qpayload_to_json(p)).map_err(|e| StoreError::Payload(e.to_string()))
}

/// Converts a Qdrant payload (`HashMap<String, qdrant::Value>`) into JSON.
fn qpayload_to_json(p: HashMap<String, QValue>) -> serde_json::Value {
    serde_json::Value::Object(p.into_iter().map(|(k, v)| (k, qvalue_to_json(v))).collect())
}

fn qvalue_to_json(v: QValue) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind as K;
    match v.kind {
        Some(K::StringValue(s)) => serde_json::Value::String(s),
        Some(K::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(K::DoubleValue(f)) => serde_json::json!(f),
        Some(K::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(K::ListValue(ListValue { values })) => {
            serde_json::Value::Array(values.into_iter().map(qvalue_to_json).collect())
        }
        Some(K::StructValue(Struct { fields })) => qpayload_to_json(fields),
        Some(K::NullValue(_)) | None => serde_json::Value::Null,
    }
}
