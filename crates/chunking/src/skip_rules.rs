//! Skip rules applied before a file is read for chunking (`SPEC_FULL.md`
//! section 4.1). Gitignore matching lives with the directory walker in the
//! `indexer` crate since it needs filesystem context this crate doesn't have.

pub const MAX_FILE_BYTES: u64 = 1024 * 1024;

const SKIP_PATH_SUBSTRINGS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".eggs",
    ".cache",
    ".sass-cache",
    "bower_components",
];

#[must_use]
pub fn is_dotfile(relpath: &str) -> bool {
    relpath
        .rsplit('/')
        .next()
        .unwrap_or(relpath)
        .starts_with('.')
}

#[must_use]
pub fn has_skipped_path_segment(relpath: &str) -> bool {
    relpath
        .split('/')
        .any(|segment| SKIP_PATH_SUBSTRINGS.contains(&segment))
}

#[must_use]
pub fn should_skip(relpath: &str, size_bytes: u64) -> bool {
    size_bytes > MAX_FILE_BYTES || is_dotfile(relpath) || has_skipped_path_segment(relpath)
}

#[cfg(test)]
mod tests {
    use super::{MAX_FILE_BYTES, should_skip};

    #[test]
    fn skips_oversize_files() {
        assert!(should_skip("src/main.rs", MAX_FILE_BYTES + 1));
        assert!(!should_skip("src/main.rs", MAX_FILE_BYTES));
    }

    #[test]
    fn skips_dotfiles_and_known_directories() {
        assert!(should_skip(".env", 10));
        assert!(should_skip("node_modules/pkg/index.js", 10));
        assert!(!should_skip("src/lib.rs", 10));
    }
}
