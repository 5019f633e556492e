pub mod classify;
pub mod lines;
pub mod skip_rules;
pub mod tokens;

pub use classify::classify;
pub use lines::chunk_lines;
pub use tokens::chunk_tokens;

use common::{Chunk, FileKind};

/// Chunks one file's content according to its classified type. Returns an
/// empty list for unrecognized extensions.
#[must_use]
pub fn chunk_file(relpath: &str, content: &str) -> Vec<Chunk> {
    match classify(relpath) {
        Some(FileKind::Code) => chunk_lines(relpath, content),
        Some(FileKind::Doc) => chunk_tokens(relpath, content),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::chunk_file;

    #[test]
    fn dispatches_by_classification() {
        assert!(!chunk_file("a.rs", "fn main() {}\n").is_empty());
        assert!(!chunk_file("a.md", "# hello\n").is_empty());
        assert!(chunk_file("a.png", "binary").is_empty());
    }
}
