//! Deterministic offline embedder based on feature hashing.
//!
//! Produces a signed, L2-normalized bag-of-words dense vector plus sparse
//! term weights (`1 + ln(tf)`), keyed by BLAKE3 so results are identical
//! across runs and platforms. Useful for tests, air-gapped setups and as a
//! lexical-only fallback; it is not a semantic model.

use std::collections::BTreeMap;

use tracing::debug;

use crate::provider::{EmbeddingProvider, Encoded, ProviderFuture, SparseVector};

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Encodes one text synchronously.
    pub fn encode(&self, text: &str) -> Encoded {
        let mut dense = vec![0.0f32; self.dim];
        let mut tf: BTreeMap<u32, u32> = BTreeMap::new();

        for token in tokenize(text) {
            let h = blake3::hash(token.as_bytes());
            let b = h.as_bytes();
            let bucket = u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize % self.dim;
            let sign = if b[4] & 1 == 0 { 1.0 } else { -1.0 };
            dense[bucket] += sign;

            let term = u32::from_le_bytes([b[5], b[6], b[7], b[8]]);
            *tf.entry(term).or_insert(0) += 1;
        }

        let norm = dense.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            dense.iter_mut().for_each(|x| *x /= norm);
        }

        let (indices, values) = tf
            .into_iter()
            .map(|(idx, n)| (idx, 1.0 + (n as f32).ln()))
            .unzip();

        Encoded {
            dense,
            sparse: Some(SparseVector { indices, values }),
        }
    }
}

/// Lowercased alphanumeric runs.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_documents<'a>(
        &'a self,
        texts: &'a [String],
        batch_size: usize,
    ) -> ProviderFuture<'a, Vec<Encoded>> {
        Box::pin(async move {
            debug!(count = texts.len(), batch_size, "hash embedder: encode documents");
            Ok(texts.iter().map(|t| self.encode(t)).collect())
        })
    }

    fn encode_query<'a>(&'a self, text: &'a str) -> ProviderFuture<'a, Encoded> {
        Box::pin(async move { Ok(self.encode(text)) })
    }
}
