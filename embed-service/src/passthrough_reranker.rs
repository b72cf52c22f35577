use crate::provider::{ProviderFuture, RerankProvider};

/// Reranker used when no rerank backend is configured.
///
/// Scores strictly decrease with input position, so reranking keeps the
/// order it was given (the fused RRF order).
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

impl RerankProvider for PassthroughReranker {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn score_pairs<'a>(&'a self, pairs: &'a [(String, String)]) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(async move {
            Ok((0..pairs.len())
                .map(|i| 1.0 / (1.0 + i as f32))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scores_follow_input_order() {
        let pairs: Vec<(String, String)> = (0..4)
            .map(|i| ("q".to_string(), format!("p{i}")))
            .collect();
        let scores = PassthroughReranker.score_pairs(&pairs).await.unwrap();
        assert_eq!(scores.len(), 4);
        assert!(scores.windows(2).all(|w| w[0] > w[1]));
    }
}
