//! Tool-facing error type: the closed set of codes a caller can match on,
//! distinct from the JSON-RPC transport-level `RpcError`.

use thiserror::Error;

pub type ToolResult<T> = Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
    #[error("INDEX_UNAVAILABLE: {0}")]
    IndexUnavailable(String),
    #[error("UPSTREAM_FAILURE: {0}")]
    UpstreamFailure(String),
    #[error("CANCELLED")]
    Cancelled,
    #[error("TIMEOUT")]
    Timeout,
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl ToolError {
    /// Short, stable code suitable for a token-compact caller-facing payload.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::IndexUnavailable(_) => "INDEX_UNAVAILABLE",
            Self::UpstreamFailure(_) => "UPSTREAM_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::ToolError;

    #[test]
    fn code_is_stable_and_detail_free() {
        let err = ToolError::InvalidInput("empty query".to_string());
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(err.to_string().contains("empty query"));
    }
}
