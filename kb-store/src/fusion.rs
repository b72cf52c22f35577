//! Reciprocal Rank Fusion over ranked candidate lists.

use std::collections::HashMap;

use crate::record::{FusedCandidate, SearchCandidate};

/// Default RRF constant.
pub const RRF_K: f32 = 60.0;

/// Fuses candidates from several ranked lists.
///
/// Each appearance contributes `1 / (k + rank)` (rank is 1-based) to its
/// point's score. Output is sorted by score descending; equal scores keep the
/// order in which points were first seen in `candidates`.
pub fn rrf_fuse(candidates: &[SearchCandidate], k: f32) -> Vec<FusedCandidate> {
    let mut order: Vec<FusedCandidate> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();

    for c in candidates {
        let contribution = 1.0 / (k + c.rank as f32);
        match slot.get(c.point_id.as_str()) {
            Some(&i) => order[i].rrf_score += contribution,
            None => {
                slot.insert(c.point_id.as_str(), order.len());
                order.push(FusedCandidate {
                    point_id: c.point_id.clone(),
                    payload: c.payload.clone(),
                    rrf_score: contribution,
                });
            }
        }
    }

    // stable
    order.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CandidateSource, ChunkPayload};

    fn cand(id: &str, source: CandidateSource, rank: usize) -> SearchCandidate {
        SearchCandidate {
            point_id: id.into(),
            payload: ChunkPayload {
                doc_id: id.into(),
                chunk_id: format!("{id}-000"),
                chunk_index: 0,
                path: String::new(),
                title: String::new(),
                section_path: vec![],
                text: String::new(),
                confidence: String::new(),
                tags: vec![],
                source_repo: String::new(),
                source_path: String::new(),
                source_commit: String::new(),
            },
            source,
            rank,
            score: 0.0,
        }
    }

    fn ids(f: &[FusedCandidate]) -> Vec<&str> {
        f.iter().map(|c| c.point_id.as_str()).collect()
    }

    #[test]
    fn shared_candidates_rise_to_the_top() {
        use CandidateSource::*;
        let lists = vec![
            cand("a", Dense, 1),
            cand("b", Dense, 2),
            cand("c", Dense, 3),
            cand("c", Sparse, 1),
            cand("d", Sparse, 2),
        ];
        let fused = rrf_fuse(&lists, RRF_K);
        assert_eq!(ids(&fused), vec!["c", "a", "b", "d"]);
        let c = &fused[0];
        assert!((c.rrf_score - (1.0 / 63.0 + 1.0 / 61.0)).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        use CandidateSource::*;
        let lists = vec![cand("x", Dense, 1), cand("y", Sparse, 1)];
        assert_eq!(ids(&rrf_fuse(&lists, RRF_K)), vec!["x", "y"]);
        let lists = vec![cand("y", Dense, 1), cand("x", Sparse, 1)];
        assert_eq!(ids(&rrf_fuse(&lists, RRF_K)), vec!["y", "x"]);
    }

    #[test]
    fn each_point_appears_once() {
        use CandidateSource::*;
        let lists = vec![cand("a", Dense, 1), cand("a", Sparse, 1), cand("a", Lexical, 1)];
        let fused = rrf_fuse(&lists, RRF_K);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].rrf_score - 3.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn single_list_keeps_its_own_order() {
        use CandidateSource::*;
        let lists = vec![cand("p", Sparse, 1), cand("q", Sparse, 2), cand("r", Sparse, 3)];
        let fused = rrf_fuse(&lists, RRF_K);
        assert_eq!(ids(&fused), vec!["p", "q", "r"]);
        for (c, rank) in fused.iter().zip(1..) {
            assert!((c.rrf_score - 1.0 / (RRF_K + rank as f32)).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_input_fuses_to_empty() {
        assert!(rrf_fuse(&[], RRF_K).is_empty());
    }
}
