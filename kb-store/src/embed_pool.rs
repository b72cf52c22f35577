//! Bounded concurrent encoding of chunk batches.

use std::collections::BTreeSet;

use embed_service::{EmbeddingProvider, ProviderError};
use futures::stream::{self, StreamExt};
use md_chunker::Chunk;
use tracing::{debug, info, warn};

use crate::record::EncodedChunk;

/// A batch that could not be encoded; its documents are reported as failed.
#[derive(Debug)]
pub struct FailedBatch {
    pub doc_ids: BTreeSet<String>,
    pub error: ProviderError,
}

/// Encodes `chunks` in groups of `group_size`, running at most `concurrency`
/// groups at once. `batch_size` is forwarded to the provider.
///
/// Each group succeeds or fails on its own; results come back in completion
/// order. Dense vectors are checked against `provider.dim()`.
pub async fn encode_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: Vec<Chunk>,
    group_size: usize,
    batch_size: usize,
    concurrency: usize,
) -> Vec<Result<Vec<EncodedChunk>, FailedBatch>> {
    info!(
        "embed_pool::encode_chunks: total={} group={} concurrency={}",
        chunks.len(),
        group_size,
        concurrency
    );
    if chunks.is_empty() {
        debug!("embed_pool::encode_chunks: nothing to encode");
        return Vec::new();
    }

    let groups: Vec<Vec<Chunk>> = chunks
        .chunks(group_size.max(1))
        .map(<[Chunk]>::to_vec)
        .collect();

    stream::iter(groups)
        .map(|group| async move {
            let texts: Vec<String> = group.iter().map(Chunk::embedding_text).collect();
            let result = provider
                .encode_documents(&texts, batch_size)
                .await
                .and_then(|encoded| check_batch(provider.dim(), group.len(), encoded));
            match result {
                Ok(encoded) => Ok(group
                    .into_iter()
                    .zip(encoded)
                    .map(|(chunk, encoded)| EncodedChunk { chunk, encoded })
                    .collect()),
                Err(error) => {
                    let doc_ids = group.iter().map(|c| c.doc_id.clone()).collect();
                    warn!(error = %error, chunks = group.len(), "encode batch failed");
                    Err(FailedBatch { doc_ids, error })
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

fn check_batch(
    dim: usize,
    expected: usize,
    encoded: Vec<embed_service::Encoded>,
) -> Result<Vec<embed_service::Encoded>, ProviderError> {
    if encoded.len() != expected {
        return Err(ProviderError::CountMismatch {
            expected,
            got: encoded.len(),
        });
    }
    if let Some(bad) = encoded.iter().find(|e| e.dense.len() != dim) {
        return Err(ProviderError::DimensionMismatch {
            got: bad.dense.len(),
            want: dim,
        });
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_service::HashEmbedder;
    use md_chunker::{ChunkOptions, Document};

    fn chunks(n: usize) -> Vec<Chunk> {
        let body: String = (0..n).map(|i| format!("# S{i}\n\nbody {i}\n\n")).collect();
        let doc = Document::parse("docs/a.md", &body, &ChunkOptions::default()).unwrap();
        doc.to_chunks(1)
    }

    #[tokio::test]
    async fn encodes_every_chunk_across_groups() {
        let provider = HashEmbedder::new(16);
        let input = chunks(5);
        assert_eq!(input.len(), 5);
        let out = encode_chunks(&provider, input, 2, 8, 3).await;
        assert_eq!(out.len(), 3);
        let total: usize = out.iter().map(|r| r.as_ref().unwrap().len()).sum();
        assert_eq!(total, 5);
        assert!(out.iter().flatten().flatten().all(|e| e.encoded.dense.len() == 16));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let enc = vec![embed_service::Encoded {
            dense: vec![0.0; 3],
            sparse: None,
        }];
        assert!(matches!(
            check_batch(4, 1, enc),
            Err(ProviderError::DimensionMismatch { got: 3, want: 4 })
        ));
        assert!(matches!(
            check_batch(4, 2, Vec::new()),
            Err(ProviderError::CountMismatch { expected: 2, got: 0 })
        ));
    }
}
