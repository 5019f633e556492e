//! Directory walk feeding the incremental indexer: applies the chunker's
//! skip rules plus `.gitignore` matching (`SPEC_FULL.md` section 4.1).

use std::path::{Path, PathBuf};

use chunking::{classify, skip_rules};
use ignore::WalkBuilder;

/// A candidate file discovered under `root`, already filtered by skip rules,
/// classification, and `.gitignore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub relpath: String,
    pub abspath: PathBuf,
    pub size: u64,
}

/// Walks `root` recursively, respecting `.gitignore` (via the `ignore` crate's
/// gitwildmatch implementation) on top of the chunker's own skip rules.
#[must_use]
pub fn scan_project(root: &Path) -> Vec<ScannedFile> {
    let mut out = Vec::new();
    let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Ok(relpath) = path.strip_prefix(root) else {
            continue;
        };
        let relpath = relpath.to_string_lossy().replace('\\', "/");
        if relpath.is_empty() {
            continue;
        }
        if classify(&relpath).is_none() {
            continue;
        }
        let Ok(meta) = path.metadata() else { continue };
        if skip_rules::should_skip(&relpath, meta.len()) {
            continue;
        }
        out.push(ScannedFile {
            relpath,
            abspath: path.to_path_buf(),
            size: meta.len(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::scan_project;

    #[test]
    fn scan_skips_ignored_and_unclassified_files() {
        let base = std::env::temp_dir().join(format!("indexer-scan-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(base.join("src")).expect("mkdir src");
        fs::create_dir_all(base.join("node_modules/pkg")).expect("mkdir nm");
        fs::write(base.join("src/main.rs"), "fn main() {}").expect("write main.rs");
        fs::write(base.join("image.png"), "binary").expect("write png");
        fs::write(base.join("node_modules/pkg/a.js"), "x").expect("write nm");
        fs::write(base.join(".gitignore"), "ignored.rs\n").expect("write gitignore");
        fs::write(base.join("ignored.rs"), "fn ignored() {}").expect("write ignored");

        let files = scan_project(&base);
        let relpaths: Vec<&str> = files.iter().map(|f| f.relpath.as_str()).collect();
        assert!(relpaths.contains(&"src/main.rs"));
        assert!(!relpaths.iter().any(|p| p.contains("node_modules")));
        assert!(!relpaths.contains(&"image.png"));
        assert!(!relpaths.contains(&"ignored.rs"));

        let _ = fs::remove_dir_all(&base);
    }
}
