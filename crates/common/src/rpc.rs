//! JSON-RPC envelope types for the stdio MCP transport.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RpcId>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum RpcId {
    String(String),
    Number(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RpcResponse<T> {
    pub jsonrpc: &'static str,
    #[serde(default)]
    pub id: Option<RpcId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl<T> RpcResponse<T> {
    #[must_use]
    pub fn ok(id: Option<RpcId>, result: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn err(id: Option<RpcId>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    #[must_use]
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i64(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidParams,
    MethodNotFound,
    IndexUnavailable,
    Timeout,
    Internal,
}

impl RpcErrorCode {
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidParams => -32602,
            Self::MethodNotFound => -32601,
            Self::IndexUnavailable => -32010,
            Self::Timeout => -32011,
            Self::Internal => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RpcError, RpcErrorCode, RpcId, RpcResponse};

    #[test]
    fn ok_response_serializes_without_error_field() {
        let response = RpcResponse::ok(Some(RpcId::Number(1)), serde_json::json!({"hits": []}));
        let value = serde_json::to_value(&response).expect("serialize");
        assert!(value.get("error").is_none());
        assert!(value.get("result").is_some());
    }

    #[test]
    fn error_codes_match_protocol_reserved_ranges() {
        assert_eq!(RpcError::new(RpcErrorCode::MethodNotFound, "x").code, -32601);
        assert_eq!(RpcErrorCode::IndexUnavailable.as_i64(), -32010);
    }
}
