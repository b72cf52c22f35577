//! Capability interfaces for embedding and reranking.
//!
//! Async is required because most real providers perform HTTP requests; the
//! traits stay object-safe so stores and retrievers can hold
//! `Arc<dyn EmbeddingProvider>`.

use std::{future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use crate::error_handler::Result;

/// Boxed future returned by provider methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Sparse lexical weights; `indices` are sorted and unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product of two sorted sparse vectors.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }
}

/// Output of one encode: a dense vector and, when the backend supports it,
/// sparse lexical weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
}

/// Provider interface for embedding generation.
///
/// Implementations must return exactly one [`Encoded`] per input text, in
/// input order, each with a dense vector of length [`EmbeddingProvider::dim`].
pub trait EmbeddingProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Dense vector size.
    fn dim(&self) -> usize;

    /// Encodes documents, sending at most `batch_size` texts per backend call.
    fn encode_documents<'a>(
        &'a self,
        texts: &'a [String],
        batch_size: usize,
    ) -> ProviderFuture<'a, Vec<Encoded>>;

    /// Encodes a single query.
    fn encode_query<'a>(&'a self, text: &'a str) -> ProviderFuture<'a, Encoded>;
}

/// Cross-encoder style relevance scoring.
pub trait RerankProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// One score per `(query, passage)` pair, in input order. Higher is better.
    fn score_pairs<'a>(&'a self, pairs: &'a [(String, String)]) -> ProviderFuture<'a, Vec<f32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_dot_matches_shared_indices() {
        let a = SparseVector {
            indices: vec![1, 4, 9],
            values: vec![1.0, 2.0, 3.0],
        };
        let b = SparseVector {
            indices: vec![4, 9, 12],
            values: vec![0.5, 1.0, 7.0],
        };
        assert_eq!(a.dot(&b), 2.0 * 0.5 + 3.0);
        assert_eq!(a.dot(&SparseVector::default()), 0.0);
    }
}
