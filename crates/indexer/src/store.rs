//! Incremental indexer (C5) and per-project store glue: binds the chunker
//! (C1), embedding provider (C2), lexical index (C3), and vector index (C4)
//! into the operations `SPEC_FULL.md` section 4.5/4.6 describes.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::UNIX_EPOCH,
};

use anyhow::Result;
use common::{Chunk, Hit};
use embeddings::EmbeddingProvider;
use search_core::{DegradedLexicalIndex, FlatVectorIndex, SourceScore, TantivyLexicalIndex, hybrid_fuse};
use tracing::warn;

use crate::scan::scan_project;
use crate::state::{IndexState, IndexStats, file_meta, is_modified};

/// File paths for one project's persisted artifacts, rooted at the server's
/// data directory (`SPEC_FULL.md` section 6).
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub chunks_jsonl: PathBuf,
    pub index_state_json: PathBuf,
    pub bm25_dir: PathBuf,
    pub vector_bin: PathBuf,
}

impl StorePaths {
    #[must_use]
    pub fn for_project(data_dir: &Path, project_name: &str) -> Self {
        Self {
            chunks_jsonl: data_dir.join(format!("chunks_{project_name}.jsonl")),
            index_state_json: data_dir.join(format!("index_state_{project_name}.json")),
            bm25_dir: data_dir.join(format!("corpus_{project_name}")),
            vector_bin: data_dir.join(format!("vector_index_{project_name}.bin")),
        }
    }
}

enum LexicalBackend {
    Tantivy(TantivyLexicalIndex),
    Degraded,
}

/// Owns every per-project artifact: chunk list, change-detection state,
/// lexical index, and vector index. One instance per active project.
pub struct ProjectStore {
    pub root: PathBuf,
    pub paths: StorePaths,
    pub embeddings: Arc<EmbeddingProvider>,
    chunks: Vec<Chunk>,
    state: IndexState,
    lexical: LexicalBackend,
    vector: FlatVectorIndex,
}

impl ProjectStore {
    /// Opens (or creates) a project's persisted store. Falls back to a
    /// degraded in-memory lexical scorer if the FTS engine cannot be opened
    /// (`SPEC_FULL.md` section 4.3).
    pub fn open(root: PathBuf, paths: StorePaths, embeddings: Arc<EmbeddingProvider>) -> Result<Self> {
        let chunks = load_chunks(&paths.chunks_jsonl)?;
        let state = IndexState::load(&paths.index_state_json)?;
        let lexical = match TantivyLexicalIndex::open_or_create_on_disk(&paths.bm25_dir) {
            Ok(mut index) => {
                rebuild_lexical(&mut index, &chunks)?;
                LexicalBackend::Tantivy(index)
            }
            Err(err) => {
                warn!(error = %err, "failed to open lexical index; falling back to degraded mode");
                LexicalBackend::Degraded
            }
        };
        let vector = FlatVectorIndex::load(&paths.vector_bin, embeddings.vector_dim())?;

        Ok(Self {
            root,
            paths,
            embeddings,
            chunks,
            state,
            lexical,
            vector,
        })
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn has_vector_index(&self) -> bool {
        !self.vector.is_empty()
    }

    /// The incremental indexer (C5): detects changed files under `root`,
    /// re-chunks the delta, and rebuilds the lexical and vector stores
    /// wholesale from the combined chunk list. Returns `None` if nothing
    /// changed.
    pub async fn auto_index_if_needed(&mut self) -> Result<Option<IndexStats>> {
        let scanned = scan_project(&self.root);

        let mut current_meta = BTreeMap::new();
        for file in &scanned {
            let Ok(meta) = fs::metadata(&file.abspath) else { continue };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_secs());
            current_meta.insert(file.relpath.clone(), file_meta(&file.abspath, file.size, mtime));
        }

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for (relpath, current) in &current_meta {
            match self.state.files.get(relpath) {
                None => added.push(relpath.clone()),
                Some(prior) if is_modified(prior, current) => modified.push(relpath.clone()),
                Some(_) => {}
            }
        }
        let deleted: Vec<String> = self
            .state
            .files
            .keys()
            .filter(|relpath| !current_meta.contains_key(*relpath))
            .cloned()
            .collect();

        if added.is_empty() && modified.is_empty() && deleted.is_empty() {
            return Ok(None);
        }

        let changed: HashSet<&str> = added
            .iter()
            .chain(modified.iter())
            .chain(deleted.iter())
            .map(String::as_str)
            .collect();

        let chunks_removed = self
            .chunks
            .iter()
            .filter(|chunk| changed.contains(file_prefix(&chunk.source).as_str()))
            .count();
        let kept: Vec<Chunk> = self
            .chunks
            .drain(..)
            .filter(|chunk| !changed.contains(file_prefix(&chunk.source).as_str()))
            .collect();

        let mut new_chunks = Vec::new();
        for relpath in added.iter().chain(modified.iter()) {
            let abspath = self.root.join(relpath);
            match fs::read_to_string(&abspath) {
                Ok(content) => new_chunks.extend(chunking::chunk_file(relpath, &content)),
                Err(err) => {
                    warn!(file = %relpath, error = %err, "skipping unreadable file during incremental index");
                }
            }
        }

        let chunks_added = new_chunks.len();
        let mut combined = kept;
        combined.extend(new_chunks);

        // Every fallible step (embedding, vector build) must succeed before the lexical
        // index is committed, or a failure here would leave BM25 reflecting the new file
        // set while chunks/vector/state still reflect the old one.
        let vectors = self
            .embeddings
            .encode_strict(&combined.iter().map(|c| c.text.clone()).collect::<Vec<_>>())
            .await?;
        self.vector.build(&combined, &vectors)?;

        match &mut self.lexical {
            LexicalBackend::Tantivy(index) => rebuild_lexical(index, &combined)?,
            LexicalBackend::Degraded => {}
        }

        self.chunks = combined;
        for relpath in &deleted {
            self.state.files.remove(relpath);
        }
        for (relpath, meta) in current_meta {
            self.state.files.insert(relpath, meta);
        }

        save_chunks(&self.paths.chunks_jsonl, &self.chunks)?;
        self.vector.save(&self.paths.vector_bin)?;
        self.state.save(&self.paths.index_state_json)?;

        Ok(Some(IndexStats {
            chunks_added,
            chunks_removed,
            chunks_total: self.chunks.len(),
        }))
    }

    /// Forces a full rebuild of both the lexical and vector stores from
    /// every file currently under `root`, regardless of whether the
    /// incremental change-detector would consider them modified. Used by
    /// the explicit `index.rebuild` tool (as opposed to the auto-index
    /// path, which only touches files it detects as changed).
    pub async fn rebuild_all(&mut self) -> Result<IndexStats> {
        self.state = IndexState::default();
        self.chunks.clear();
        self.auto_index_if_needed().await.map(|stats| stats.unwrap_or(IndexStats { chunks_added: 0, chunks_removed: 0, chunks_total: 0 }))
    }

    /// Re-embeds the existing chunk list and rebuilds only the vector store,
    /// leaving the lexical index, chunk list, and `IndexState` untouched.
    /// Used by `index.rebuild{vector_only: true}`, e.g. after correcting an
    /// embedding-dimension misconfiguration (`SPEC_FULL.md` section 4.2).
    pub async fn rebuild_vector_only(&mut self) -> Result<IndexStats> {
        let vectors = self
            .embeddings
            .encode_strict(&self.chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>())
            .await?;
        self.vector.build(&self.chunks, &vectors)?;
        self.vector.save(&self.paths.vector_bin)?;
        Ok(IndexStats { chunks_added: 0, chunks_removed: 0, chunks_total: self.chunks.len() })
    }

    /// The hybrid retriever (C6): fetches `3*k` candidates from each engine,
    /// fuses, deduplicates, and truncates to `k`.
    pub async fn hybrid_search(
        &self,
        query: &str,
        k: usize,
        bm25_weight: f32,
        vector_weight: f32,
    ) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let candidate_k = k.saturating_mul(3).max(1);
        let bm25_candidates = self.bm25_search(query, candidate_k)?;

        let vector_candidates = if self.vector.is_empty() {
            Vec::new()
        } else {
            let vectors = self.embeddings.encode(&[query.to_string()]).await?;
            match vectors.into_iter().next() {
                Some(query_vec) => self
                    .vector
                    .search(&query_vec, candidate_k)
                    .into_iter()
                    .map(|(source, text, score)| SourceScore { source, text, score })
                    .collect(),
                None => Vec::new(),
            }
        };

        Ok(hybrid_fuse(&bm25_candidates, &vector_candidates, k, bm25_weight, vector_weight))
    }

    fn bm25_search(&self, query: &str, top_k: usize) -> Result<Vec<SourceScore>> {
        let raw = match &self.lexical {
            LexicalBackend::Tantivy(index) => index.search(query, top_k)?,
            LexicalBackend::Degraded => {
                DegradedLexicalIndex::new(self.chunks.clone()).search(query, top_k)
            }
        };
        let text_by_source: BTreeMap<&str, &str> =
            self.chunks.iter().map(|c| (c.source.as_str(), c.text.as_str())).collect();
        Ok(raw
            .into_iter()
            .map(|(source, score)| {
                let text = text_by_source.get(source.as_str()).copied().unwrap_or_default().to_string();
                SourceScore { source, text, score }
            })
            .collect())
    }
}

fn rebuild_lexical(index: &mut TantivyLexicalIndex, chunks: &[Chunk]) -> Result<()> {
    index.reset()?;
    for chunk in chunks {
        index.add_chunk(chunk)?;
    }
    index.commit()?;
    Ok(())
}

/// The file-prefix a chunk's source belongs to: the relative path with the
/// trailing `:<line>` / `:chunk<N>` suffix stripped.
#[must_use]
fn file_prefix(source: &str) -> String {
    common::file_key_of(source).to_string()
}

fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(line)?);
    }
    Ok(out)
}

fn save_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut buf = String::new();
    for chunk in chunks {
        buf.push_str(&serde_json::to_string(chunk)?);
        buf.push('\n');
    }
    let tmp = path.with_extension("jsonl.tmp");
    fs::write(&tmp, buf)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use embeddings::{EmbeddingConfig, EmbeddingProvider};

    use super::*;

    fn test_embeddings() -> Arc<EmbeddingProvider> {
        Arc::new(EmbeddingProvider::new(EmbeddingConfig {
            vector_dim: 8,
            local: embeddings::LocalBackendConfig { allow_pseudo_fallback: true, ..Default::default() },
            ..Default::default()
        }))
    }

    fn temp_dir(label: &str) -> PathBuf {
        let base = std::env::temp_dir().join(format!("indexer-store-test-{label}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).expect("mkdir");
        base
    }

    #[tokio::test]
    async fn indexes_new_project_and_returns_stats() {
        let root = temp_dir("proj");
        fs::write(root.join("a.py"), "def hello():\n    return 1\n").expect("write a.py");
        let data_dir = temp_dir("data");
        let paths = StorePaths::for_project(&data_dir, "demo");

        let mut store = ProjectStore::open(root.clone(), paths, test_embeddings()).expect("open");
        let stats = store.auto_index_if_needed().await.expect("index").expect("some stats");
        assert_eq!(stats.chunks_added, 1);
        assert_eq!(stats.chunks_total, 1);

        let hits = store.hybrid_search("hello", 4, 0.5, 0.5).await.expect("search");
        assert!(hits.iter().any(|h| h.source.starts_with("a.py")));
    }

    #[tokio::test]
    async fn second_call_with_no_changes_returns_none() {
        let root = temp_dir("proj-idempotent");
        fs::write(root.join("a.py"), "def hello():\n    return 1\n").expect("write a.py");
        let data_dir = temp_dir("data-idempotent");
        let paths = StorePaths::for_project(&data_dir, "demo");

        let mut store = ProjectStore::open(root.clone(), paths, test_embeddings()).expect("open");
        store.auto_index_if_needed().await.expect("index");
        let second = store.auto_index_if_needed().await.expect("index again");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn deleting_a_file_removes_its_chunks() {
        let root = temp_dir("proj-delete");
        fs::write(root.join("a.py"), "def hello():\n    return 1\n").expect("write a.py");
        fs::write(root.join("b.py"), "def world():\n    return 2\n").expect("write b.py");
        let data_dir = temp_dir("data-delete");
        let paths = StorePaths::for_project(&data_dir, "demo");

        let mut store = ProjectStore::open(root.clone(), paths.clone(), test_embeddings())
            .expect("open");
        store.auto_index_if_needed().await.expect("initial index");

        fs::remove_file(root.join("b.py")).expect("remove b.py");
        let stats = store
            .auto_index_if_needed()
            .await
            .expect("reindex")
            .expect("stats after delete");
        assert_eq!(stats.chunks_added, 0);
        assert_eq!(stats.chunks_removed, 1);

        let hits = store.hybrid_search("world", 5, 0.5, 0.5).await.expect("search");
        assert!(!hits.iter().any(|h| h.source.starts_with("b.py")));
    }
}
