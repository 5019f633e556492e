//! Semantic response cache (C10): per-project, holds prior `(query, value)`
//! pairs alongside a flat cosine-similarity index of query embeddings.
//! Persisted as a single `bincode`-encoded file, mirroring the vector
//! index's on-disk shape (`search-core`'s `FlatVectorIndex`).

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SemanticEntry {
    query_text: String,
    value: String,
    expire_at: i64,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticCache {
    entries: Vec<SemanticEntry>,
}

impl SemanticCache {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        let (mut cache, _): (Self, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        let now = now_secs();
        cache.entries.retain(|e| e.expire_at >= now);
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Returns the value of the nearest entry if its cosine similarity meets
    /// `threshold` and it has not expired.
    #[must_use]
    pub fn get(&self, query_vector: &[f32], threshold: f32) -> Option<String> {
        let now = now_secs();
        self.entries
            .iter()
            .filter(|e| e.expire_at >= now)
            .map(|e| (e, cosine(&e.vector, query_vector)))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entry, _)| entry.value.clone())
    }

    pub fn set(&mut self, query_text: &str, query_vector: Vec<f32>, value: &str, ttl_secs: i64) {
        self.entries.push(SemanticEntry {
            query_text: query_text.to_string(),
            value: value.to_string(),
            expire_at: now_secs() + ttl_secs,
            vector: query_vector,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SIMILARITY_THRESHOLD, SemanticCache};

    #[test]
    fn hit_requires_similarity_above_threshold() {
        let mut cache = SemanticCache::default();
        cache.set("how do I parse dates", vec![1.0, 0.0], "answer-a", 60);
        assert_eq!(
            cache.get(&[1.0, 0.0], DEFAULT_SIMILARITY_THRESHOLD),
            Some("answer-a".to_string())
        );
        assert_eq!(cache.get(&[0.0, 1.0], DEFAULT_SIMILARITY_THRESHOLD), None);
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let mut cache = SemanticCache::default();
        cache.set("q", vec![1.0, 0.0], "answer", -1);
        assert_eq!(cache.get(&[1.0, 0.0], DEFAULT_SIMILARITY_THRESHOLD), None);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("semantic_cache_demo.bin");
        let mut cache = SemanticCache::default();
        cache.set("q", vec![0.6, 0.8], "answer", 60);
        cache.save(&path).expect("save");

        let loaded = SemanticCache::load(&path).expect("load");
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn load_purges_expired_entries() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("semantic_cache_demo.bin");
        let mut cache = SemanticCache::default();
        cache.set("q", vec![1.0], "answer", -1);
        cache.save(&path).expect("save");

        let loaded = SemanticCache::load(&path).expect("load");
        assert!(loaded.is_empty());
    }
}
