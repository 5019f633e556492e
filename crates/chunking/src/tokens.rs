//! Token-window chunker for documentation files (256 tokens / 32-token
//! overlap), with a CJK-aware tokenizer that splits each Han, Hiragana,
//! Katakana, or Hangul character as its own token while keeping Latin
//! words/numbers whole.

use common::{Chunk, ChunkingMethod, FileKind};
use regex::Regex;
use std::sync::OnceLock;

pub const WINDOW_TOKENS: usize = 256;
pub const OVERLAP_TOKENS: usize = 32;

fn tokenizer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\p{Han}|\p{Hiragana}|\p{Katakana}|\p{Hangul}|[A-Za-z0-9_]+|[^\s\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]")
            .expect("tokenizer regex is valid")
    })
}

#[must_use]
pub fn tokenize(text: &str) -> Vec<&str> {
    tokenizer().find_iter(text).map(|m| m.as_str()).collect()
}

#[must_use]
pub fn chunk_tokens(relpath: &str, content: &str) -> Vec<Chunk> {
    let tokens = tokenize(content);
    if tokens.is_empty() {
        return Vec::new();
    }

    let stride = WINDOW_TOKENS - OVERLAP_TOKENS;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 1usize;
    loop {
        let end = (start + WINDOW_TOKENS).min(tokens.len());
        let text = tokens[start..end].join(" ");
        if !text.trim().is_empty() {
            chunks.push(Chunk {
                text,
                source: format!("{relpath}:chunk{index}"),
                chunking_method: ChunkingMethod::Tokens,
                filetype: FileKind::Doc,
            });
            index += 1;
        }
        if end == tokens.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::{chunk_tokens, tokenize};

    #[test]
    fn splits_cjk_characters_individually() {
        let tokens = tokenize("你好世界 hello 123");
        assert_eq!(tokens, vec!["你", "好", "世", "界", "hello", "123"]);
    }

    #[test]
    fn short_doc_yields_one_chunk() {
        let chunks = chunk_tokens("README.md", "hello world this is a short document");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "README.md:chunk1");
    }

    #[test]
    fn long_doc_overlaps_by_thirty_two_tokens() {
        let words: Vec<String> = (0..600).map(|n| format!("w{n}")).collect();
        let content = words.join(" ");
        let chunks = chunk_tokens("doc.txt", &content);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].source, "doc.txt:chunk1");
        assert_eq!(chunks[1].source, "doc.txt:chunk2");
    }

    #[test]
    fn empty_doc_yields_no_chunks() {
        assert!(chunk_tokens("empty.md", "").is_empty());
    }
}
