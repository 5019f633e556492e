//! Response cache (C10): an exact-match SQL cache plus a per-project
//! semantic-similarity cache, both TTL-governed.

pub mod exact;
pub mod key;
pub mod semantic;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Result;
pub use exact::ExactCache;
pub use key::{compute_cache_key, evidence_fingerprint};
pub use semantic::{DEFAULT_SIMILARITY_THRESHOLD, SemanticCache};

/// Default TTL for `answer.generate` / `answer.accumulated` cache entries,
/// per `SPEC_FULL.md` section 4.13 step 8.
pub const DEFAULT_ANSWER_TTL_SECS: i64 = 7200;

/// Binds the exact-match cache with per-project semantic caches, loaded
/// lazily on first use and kept resident for the process lifetime.
pub struct CacheStore {
    data_dir: PathBuf,
    exact: ExactCache,
    semantic: Mutex<HashMap<String, SemanticCache>>,
}

impl CacheStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let exact = ExactCache::open(&data_dir.join("response_cache.sqlite"))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            exact,
            semantic: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn exact(&self) -> &ExactCache {
        &self.exact
    }

    fn semantic_path(&self, project: &str) -> PathBuf {
        self.data_dir.join(format!("semantic_cache_{project}.bin"))
    }

    /// Looks up the semantic cache for `project`, loading it from disk on
    /// first access and calling `f` with it.
    pub fn with_semantic<T>(&self, project: &str, f: impl FnOnce(&SemanticCache) -> T) -> Result<T> {
        let mut guard = self.semantic.lock().expect("semantic cache mutex poisoned");
        if !guard.contains_key(project) {
            let loaded = SemanticCache::load(&self.semantic_path(project))?;
            guard.insert(project.to_string(), loaded);
        }
        Ok(f(guard.get(project).expect("just inserted")))
    }

    /// Mutates the semantic cache for `project` via `f` and persists it.
    pub fn update_semantic(&self, project: &str, f: impl FnOnce(&mut SemanticCache)) -> Result<()> {
        let mut guard = self.semantic.lock().expect("semantic cache mutex poisoned");
        let path = self.semantic_path(project);
        let entry = match guard.get_mut(project) {
            Some(cache) => cache,
            None => {
                guard.insert(project.to_string(), SemanticCache::load(&path)?);
                guard.get_mut(project).expect("just inserted")
            }
        };
        f(entry);
        entry.save(&path)?;
        Ok(())
    }

    /// Clears both cache partitions for `project`, or every partition of
    /// both caches if `project == "all"` (`SPEC_FULL.md` section 9, decided
    /// Open Question 3). The semantic partition's on-disk file is dropped
    /// entirely (per `SPEC_FULL.md` section 4.10's `clear()` contract)
    /// rather than rewritten empty, and this scans `data_dir` for
    /// `semantic_cache_*.bin` files belonging to projects never loaded
    /// into this process, not just the in-memory partitions.
    pub fn clear(&self, project: &str) -> Result<()> {
        self.exact.clear(project)?;
        let mut guard = self.semantic.lock().expect("semantic cache mutex poisoned");
        if project == "all" {
            guard.clear();
            for path in self.all_semantic_cache_paths()? {
                remove_file_if_exists(&path)?;
            }
        } else {
            guard.remove(project);
            remove_file_if_exists(&self.semantic_path(project))?;
        }
        Ok(())
    }

    fn all_semantic_cache_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        if !self.data_dir.exists() {
            return Ok(paths);
        }
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("semantic_cache_") && name.ends_with(".bin") {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::CacheStore;

    #[test]
    fn semantic_and_exact_partitions_clear_independently_per_project() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = CacheStore::open(dir.path()).expect("open store");

        store.exact().set("a", "k", "v", 60).expect("set exact");
        store
            .update_semantic("a", |c| c.set("q", vec![1.0, 0.0], "answer", 60))
            .expect("set semantic");

        store.clear("a").expect("clear a");
        assert_eq!(store.exact().get("a", "k").expect("get"), None);
        let remaining = store.with_semantic("a", super::SemanticCache::len).expect("read semantic");
        assert_eq!(remaining, 0);
    }

    #[test]
    fn clear_all_clears_every_known_project_semantic_partition() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = CacheStore::open(dir.path()).expect("open store");

        store.update_semantic("a", |c| c.set("q", vec![1.0], "v", 60)).expect("seed a");
        store.update_semantic("b", |c| c.set("q", vec![1.0], "v", 60)).expect("seed b");

        store.clear("all").expect("clear all");
        assert_eq!(store.with_semantic("a", super::SemanticCache::len).expect("a"), 0);
        assert_eq!(store.with_semantic("b", super::SemanticCache::len).expect("b"), 0);
    }
}
