//! Per-project change-detection state (`SPEC_FULL.md` section 3, `IndexState`).
//!
//! Maps each indexed file's relative path to the metadata used to decide
//! whether it has changed since the last incremental update.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// MD5 is only computed for files under this size; larger files fall back to
/// `(mtime, size)` comparison (`SPEC_FULL.md` section 3).
pub const HASH_SIZE_LIMIT: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub mtime: u64,
    pub size: u64,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexState {
    pub files: BTreeMap<String, FileMeta>,
}

impl IndexState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading index state: {}", path.display()))?;
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing index state: {}", path.display()))?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Computed metadata for a file currently on disk, before comparison against
/// the persisted `IndexState`.
#[must_use]
pub fn file_meta(path: &Path, size: u64, mtime: u64) -> FileMeta {
    let hash = if size < HASH_SIZE_LIMIT {
        fs::read(path).ok().map(|bytes| {
            let mut hasher = Md5::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        })
    } else {
        None
    };
    FileMeta { mtime, size, hash }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub chunks_added: usize,
    pub chunks_removed: usize,
    pub chunks_total: usize,
}

/// The outcome of comparing a file's current metadata against a prior entry:
/// whether the file is new, changed, or unchanged (`SPEC_FULL.md` section 4.5
/// step 3).
#[must_use]
pub fn is_modified(prior: &FileMeta, current: &FileMeta) -> bool {
    if prior.mtime == current.mtime && prior.size == current.size {
        return false;
    }
    if let (Some(prior_hash), Some(current_hash)) = (&prior.hash, &current.hash) {
        if prior_hash == current_hash {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{FileMeta, is_modified};

    #[test]
    fn unchanged_when_hashes_match_even_if_mtime_drifts() {
        let prior = FileMeta { mtime: 1, size: 10, hash: Some("abc".into()) };
        let current = FileMeta { mtime: 2, size: 10, hash: Some("abc".into()) };
        assert!(!is_modified(&prior, &current));
    }

    #[test]
    fn modified_when_size_changes_without_hash() {
        let prior = FileMeta { mtime: 1, size: 10, hash: None };
        let current = FileMeta { mtime: 1, size: 20, hash: None };
        assert!(is_modified(&prior, &current));
    }

    #[test]
    fn modified_when_hash_differs() {
        let prior = FileMeta { mtime: 1, size: 10, hash: Some("abc".into()) };
        let current = FileMeta { mtime: 1, size: 10, hash: Some("def".into()) };
        assert!(is_modified(&prior, &current));
    }
}
