//! Score fusion for the hybrid retriever (C6): normalize each engine's scores
//! by its own max, weighted-sum the normalized scores per source, then drop
//! extra hits that share a file.

use common::{Hit, file_key_of};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceScore {
    pub source: String,
    pub text: String,
    pub score: f32,
}

pub const MAX_PER_FILE: usize = 2;

/// Divides every score by the list's max score. A list with max 0 (or empty)
/// is returned unchanged (all scores are already 0).
#[must_use]
pub fn normalize(scores: &[SourceScore]) -> Vec<SourceScore> {
    let max = scores.iter().map(|s| s.score).fold(0.0_f32, f32::max);
    if max <= 0.0 {
        return scores.to_vec();
    }
    scores
        .iter()
        .map(|s| SourceScore {
            source: s.source.clone(),
            text: s.text.clone(),
            score: s.score / max,
        })
        .collect()
}

/// Fuses normalized BM25 and vector candidate lists into ranked hits.
/// Missing provenance from either source contributes 0 to the weighted sum.
#[must_use]
pub fn fuse(bm25: &[SourceScore], vector: &[SourceScore], bm25_weight: f32, vector_weight: f32) -> Vec<Hit> {
    let bm25_norm = normalize(bm25);
    let vector_norm = normalize(vector);

    let mut texts: HashMap<String, String> = HashMap::new();
    let mut scores: HashMap<String, f32> = HashMap::new();

    for s in &bm25_norm {
        texts.entry(s.source.clone()).or_insert_with(|| s.text.clone());
        *scores.entry(s.source.clone()).or_insert(0.0) += bm25_weight * s.score;
    }
    for s in &vector_norm {
        texts.entry(s.source.clone()).or_insert_with(|| s.text.clone());
        *scores.entry(s.source.clone()).or_insert(0.0) += vector_weight * s.score;
    }

    let mut hits: Vec<Hit> = scores
        .into_iter()
        .map(|(source, score)| Hit {
            text: texts.remove(&source).unwrap_or_default(),
            source,
            score,
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.source.cmp(&b.source)));
    hits
}

/// Keeps at most `max_per_file` hits per file key, preserving score order.
#[must_use]
pub fn dedup_same_file(hits: Vec<Hit>, max_per_file: usize) -> Vec<Hit> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    hits.into_iter()
        .filter(|hit| {
            let key = file_key_of(&hit.source).to_string();
            let count = counts.entry(key).or_insert(0);
            *count += 1;
            *count <= max_per_file
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{SourceScore, dedup_same_file, fuse, normalize};
    use common::Hit;

    fn score(source: &str, value: f32) -> SourceScore {
        SourceScore {
            source: source.to_string(),
            text: format!("text-{source}"),
            score: value,
        }
    }

    #[test]
    fn normalize_divides_by_max() {
        let normalized = normalize(&[score("a", 4.0), score("b", 2.0)]);
        assert!((normalized[0].score - 1.0).abs() < f32::EPSILON);
        assert!((normalized[1].score - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn normalize_guards_zero_max() {
        let normalized = normalize(&[score("a", 0.0)]);
        assert!((normalized[0].score - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn fuse_weights_both_sources() {
        let bm25 = vec![score("a.rs:1", 10.0), score("b.rs:1", 5.0)];
        let vector = vec![score("a.rs:1", 0.5), score("c.rs:1", 1.0)];
        let fused = fuse(&bm25, &vector, 0.5, 0.5);
        assert_eq!(fused[0].source, "a.rs:1");
    }

    #[test]
    fn dedup_keeps_at_most_two_per_file() {
        let hits = vec![
            Hit { text: String::new(), source: "a.rs:1".into(), score: 0.9 },
            Hit { text: String::new(), source: "a.rs:51".into(), score: 0.8 },
            Hit { text: String::new(), source: "a.rs:101".into(), score: 0.7 },
            Hit { text: String::new(), source: "b.rs:1".into(), score: 0.6 },
        ];
        let deduped = dedup_same_file(hits, 2);
        assert_eq!(deduped.len(), 3);
        assert!(deduped.iter().filter(|h| h.source.starts_with("a.rs")).count() == 2);
    }
}
