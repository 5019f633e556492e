pub mod config;
pub mod error;
pub mod project;
pub mod rpc;
pub mod tokens;

pub use config::AppConfig;
pub use error::{ToolError, ToolResult};
pub use project::{Project, ProjectRegistry};
pub use rpc::{RpcError, RpcId, RpcRequest, RpcResponse};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single retrieval unit produced by the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Chunk {
    pub text: String,
    /// Stable identifier: `<relpath>:<line>` for code, `<relpath>:chunk<N>` for prose.
    pub source: String,
    pub chunking_method: ChunkingMethod,
    pub filetype: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMethod {
    Lines,
    Tokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Code,
    Doc,
}

impl Chunk {
    /// The file-level key used for same-file deduplication: strips a trailing
    /// `:<digits>` or `:chunk<digits>` suffix from `source`.
    #[must_use]
    pub fn file_key(&self) -> &str {
        file_key_of(&self.source)
    }
}

#[must_use]
pub fn file_key_of(source: &str) -> &str {
    if let Some(idx) = source.rfind(":chunk") {
        let tail = &source[idx + ":chunk".len()..];
        if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
            return &source[..idx];
        }
    }
    if let Some(idx) = source.rfind(':') {
        let tail = &source[idx + 1..];
        if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
            return &source[..idx];
        }
    }
    source
}

/// A scored retrieval result returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Hit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::file_key_of;

    #[test]
    fn strips_line_suffix() {
        assert_eq!(file_key_of("src/main.rs:42"), "src/main.rs");
    }

    #[test]
    fn strips_chunk_suffix() {
        assert_eq!(file_key_of("README.md:chunk3"), "README.md");
    }

    #[test]
    fn leaves_plain_path_alone() {
        assert_eq!(file_key_of("README.md"), "README.md");
    }
}
