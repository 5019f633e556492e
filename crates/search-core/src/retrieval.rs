//! Hybrid retriever (C6): combines already-fetched BM25 and vector candidate
//! lists into the final ranked, deduplicated `Hit` list. Index lookups
//! themselves (requesting `3*k` candidates from each engine) are the
//! caller's responsibility since they require concrete store handles that
//! live in the `indexer` crate.

use crate::fusion::{MAX_PER_FILE, SourceScore, dedup_same_file, fuse};
use common::Hit;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalDefaults {
    pub candidate_multiplier: usize,
    pub top_k: usize,
    pub bm25_weight: f32,
    pub vector_weight: f32,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            candidate_multiplier: 3,
            top_k: 8,
            bm25_weight: 0.5,
            vector_weight: 0.5,
        }
    }
}

/// Fuses BM25 and vector candidates per `SPEC_FULL.md` section 4.6: if there
/// are no vector candidates at all (no vector index built yet), the BM25
/// ranking is returned unchanged rather than fused against an empty list.
#[must_use]
pub fn hybrid_fuse(
    bm25_candidates: &[SourceScore],
    vector_candidates: &[SourceScore],
    k: usize,
    bm25_weight: f32,
    vector_weight: f32,
) -> Vec<Hit> {
    if vector_candidates.is_empty() {
        let mut hits: Vec<Hit> = bm25_candidates
            .iter()
            .map(|s| Hit {
                text: s.text.clone(),
                source: s.source.clone(),
                score: s.score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        let deduped = dedup_same_file(hits, MAX_PER_FILE);
        return deduped.into_iter().take(k).collect();
    }

    let fused = fuse(bm25_candidates, vector_candidates, bm25_weight, vector_weight);
    let deduped = dedup_same_file(fused, MAX_PER_FILE);
    deduped.into_iter().take(k).collect()
}
