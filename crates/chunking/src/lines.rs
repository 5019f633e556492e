//! Line-window chunker for code files (50 lines / 10-line overlap).

use common::{Chunk, ChunkingMethod, FileKind};

pub const WINDOW_LINES: usize = 50;
pub const OVERLAP_LINES: usize = 10;

#[must_use]
pub fn chunk_lines(relpath: &str, content: &str) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let stride = WINDOW_LINES - OVERLAP_LINES;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + WINDOW_LINES).min(lines.len());
        let text = lines[start..end].join("\n");
        if !text.trim().is_empty() {
            chunks.push(Chunk {
                text,
                source: format!("{relpath}:{}", start + 1),
                chunking_method: ChunkingMethod::Lines,
                filetype: FileKind::Code,
            });
        }
        if end == lines.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::chunk_lines;

    #[test]
    fn single_short_file_yields_one_chunk() {
        let content = "a\nb\nc\n";
        let chunks = chunk_lines("a.rs", content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "a.rs:1");
    }

    #[test]
    fn long_file_overlaps_by_ten_lines() {
        let content = (1..=120).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let chunks = chunk_lines("a.py", &content);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].source, "a.py:1");
        assert_eq!(chunks[1].source, "a.py:41");
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        assert!(chunk_lines("empty.rs", "").is_empty());
    }

    #[test]
    fn rechunking_unchanged_content_is_byte_identical() {
        let content = "fn a() {}\nfn b() {}\n";
        assert_eq!(chunk_lines("x.rs", content), chunk_lines("x.rs", content));
    }
}
