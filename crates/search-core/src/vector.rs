//! Flat inner-product vector index (C4): no external service, no
//! approximate indexing, persisted as a single bincode-encoded file
//! containing vectors and parallel chunk metadata.

use anyhow::{Result, bail};
use common::Chunk;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSearchConfig {
    pub vector_dim: usize,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self { vector_dim: 384 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    source: String,
    text: String,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatVectorIndex {
    dim: usize,
    entries: Vec<Entry>,
}

impl FlatVectorIndex {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim, entries: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces all entries. Fails if any vector's dimension doesn't match
    /// the index's configured dimension — a fatal error during a build, per
    /// `SPEC_FULL.md` section 4.4.
    pub fn build(&mut self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        self.entries.clear();
        self.add(chunks, vectors)
    }

    pub fn add(&mut self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!("chunks and vectors length mismatch: {} vs {}", chunks.len(), vectors.len());
        }
        for vector in vectors {
            if vector.len() != self.dim {
                bail!(
                    "embedding dimension {} does not match configured vector_dim {}; update the embedding configuration",
                    vector.len(),
                    self.dim
                );
            }
        }
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            self.entries.push(Entry {
                source: chunk.source.clone(),
                text: chunk.text.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    /// Removes every entry whose source starts with any of `file_prefixes`.
    pub fn remove_by_file_prefixes(&mut self, file_prefixes: &[String]) {
        self.entries
            .retain(|e| !file_prefixes.iter().any(|p| e.source.starts_with(p.as_str())));
    }

    /// Cosine similarity search assuming both corpus and query vectors are
    /// L2-normalized, so inner product equals cosine similarity. A dimension
    /// mismatch here is advisory: it's logged and yields an empty result
    /// rather than aborting the caller's retrieval.
    #[must_use]
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Vec<(String, String, f32)> {
        if query_vector.len() != self.dim {
            tracing::warn!(
                expected = self.dim,
                actual = query_vector.len(),
                "vector search query dimension mismatch; returning no vector candidates"
            );
            return Vec::new();
        }
        let mut scored: Vec<(String, String, f32)> = self
            .entries
            .iter()
            .map(|e| {
                let score = dot(&e.vector, query_vector);
                (e.source.clone(), e.text.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.2.total_cmp(&a.2));
        scored.truncate(top_k);
        scored
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

    pub fn load(path: &Path, dim: usize) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(dim));
        }
        let bytes = std::fs::read(path)?;
        let (index, _): (Self, usize) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(index)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use common::{Chunk, ChunkingMethod, FileKind};

    use super::FlatVectorIndex;

    fn chunk(source: &str) -> Chunk {
        Chunk {
            text: format!("text for {source}"),
            source: source.to_string(),
            chunking_method: ChunkingMethod::Lines,
            filetype: FileKind::Code,
        }
    }

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let mut index = FlatVectorIndex::new(2);
        index
            .build(&[chunk("a.rs:1"), chunk("b.rs:1")], &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .expect("build");
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].0, "a.rs:1");
    }

    #[test]
    fn build_rejects_dimension_mismatch() {
        let mut index = FlatVectorIndex::new(3);
        let err = index.build(&[chunk("a.rs:1")], &[vec![1.0, 0.0]]).unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[test]
    fn remove_by_file_prefix_drops_matching_entries() {
        let mut index = FlatVectorIndex::new(1);
        index
            .build(&[chunk("a.rs:1"), chunk("a.rs:51"), chunk("b.rs:1")], &[vec![1.0], vec![1.0], vec![1.0]])
            .expect("build");
        index.remove_by_file_prefixes(&["a.rs".to_string()]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("vectors.bin");
        let mut index = FlatVectorIndex::new(2);
        index.build(&[chunk("a.rs:1")], &[vec![0.6, 0.8]]).expect("build");
        index.save(&path).expect("save");

        let loaded = FlatVectorIndex::load(&path, 2).expect("load");
        assert_eq!(loaded.len(), 1);
    }
}
