//! Top-level JSON-RPC method dispatch: MCP lifecycle methods
//! (`initialize`, `tools/list`, ...) plus `tools/call` forwarding into the
//! tool catalog in `handlers`.

use common::rpc::{RpcError, RpcErrorCode, RpcId, RpcRequest, RpcResponse};
use serde_json::{Value, json};

use crate::handlers::call_tool;
use crate::schema::tool_catalog;
use crate::state::AppState;

const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

pub async fn dispatch(state: &AppState, request: RpcRequest) -> RpcResponse<Value> {
    let id = request.id.clone();
    match request.method.as_str() {
        "ping" => RpcResponse::ok(id, json!({"ok": true})),
        "initialize" => initialize(id, &request.params),
        "tools/list" => tools_list(id),
        "resources/list" => RpcResponse::ok(id, json!({"resources": []})),
        "prompts/list" => RpcResponse::ok(id, json!({"prompts": []})),
        "tools/call" => tools_call(state, id, request.params).await,
        other => RpcResponse::err(id, RpcError::new(RpcErrorCode::MethodNotFound, format!("unknown method: {other}"))),
    }
}

fn initialize(id: Option<RpcId>, params: &Value) -> RpcResponse<Value> {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    RpcResponse::ok(
        id,
        json!({
            "protocolVersion": protocol_version,
            "serverInfo": {"name": "mcp-server", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {"tools": {"listChanged": false}},
        }),
    )
}

fn tools_list(id: Option<RpcId>) -> RpcResponse<Value> {
    let tools = tool_catalog();
    RpcResponse::ok(id, json!({"tools": tools}))
}

async fn tools_call(state: &AppState, id: Option<RpcId>, params: Value) -> RpcResponse<Value> {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::err(id, RpcError::new(RpcErrorCode::InvalidParams, "tools/call requires a \"name\" field"));
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match call_tool(state, name, arguments).await {
        Ok(result) => RpcResponse::ok(
            id,
            json!({
                "content": [{"type": "text", "text": result.to_string()}],
                "structuredContent": result,
                "isError": false,
            }),
        ),
        Err(err) => {
            let code = tool_error_code(&err.to_string());
            RpcResponse::ok(
                id,
                json!({
                    "content": [{"type": "text", "text": code}],
                    "structuredContent": {"ok": false, "error": code},
                    "isError": true,
                }),
            )
        }
    }
}

/// Recognizes a tool-facing error's code prefix (`common::ToolError`'s
/// `Display`, e.g. `"INVALID_INPUT: empty query"`) and returns it verbatim;
/// anything else is reported as the catch-all `INTERNAL` code, per
/// `SPEC_FULL.md` section 7's closed error-code set.
fn tool_error_code(message: &str) -> String {
    const KNOWN: [&str; 6] = ["INVALID_INPUT", "INDEX_UNAVAILABLE", "UPSTREAM_FAILURE", "CANCELLED", "TIMEOUT", "NOT_FOUND"];
    for code in KNOWN {
        if message == code {
            return message.to_string();
        }
        // `anyhow::Context` chaining can prefix the message with outer
        // context, so search for the code anywhere rather than requiring
        // it at position 0.
        if let Some(idx) = message.find(&format!("{code}: ")) {
            return message[idx..].to_string();
        }
    }
    format!("INTERNAL: {message}")
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PROTOCOL_VERSION, dispatch, tool_error_code};
    use common::rpc::{RpcId, RpcRequest};

    #[test]
    fn recognizes_known_error_codes() {
        assert_eq!(tool_error_code("INVALID_INPUT: empty query"), "INVALID_INPUT: empty query");
        assert_eq!(tool_error_code("CANCELLED"), "CANCELLED");
    }

    #[test]
    fn wraps_unrecognized_messages_as_internal() {
        assert_eq!(tool_error_code("disk full"), "INTERNAL: disk full");
    }

    #[test]
    fn finds_code_nested_inside_context_chain() {
        assert_eq!(
            tool_error_code("failed creating data dir: INDEX_UNAVAILABLE: dimension mismatch"),
            "INDEX_UNAVAILABLE: dimension mismatch"
        );
    }

    #[tokio::test]
    async fn tools_call_reports_invalid_input_code_in_structured_content() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let state = crate::state::AppState::for_tests(dir.path()).expect("state");
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(RpcId::Number(7)),
            method: "tools/call".to_string(),
            params: serde_json::json!({"name": "rag.search", "arguments": {"query": ""}}),
        };
        let response = dispatch(&state, request).await;
        let result = response.result.expect("result");
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["ok"], false);
        assert!(result["structuredContent"]["error"].as_str().unwrap().starts_with("INVALID_INPUT"));
    }

    #[tokio::test]
    async fn initialize_echoes_requested_protocol_version() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let state = crate::state::AppState::for_tests(dir.path()).expect("state");
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(RpcId::Number(1)),
            method: "initialize".to_string(),
            params: serde_json::json!({"protocolVersion": "2025-06-18"}),
        };
        let response = dispatch(&state, request).await;
        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], "2025-06-18");
    }

    #[tokio::test]
    async fn initialize_defaults_protocol_version_when_absent() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let state = crate::state::AppState::for_tests(dir.path()).expect("state");
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "initialize".to_string(),
            params: serde_json::Value::Null,
        };
        let response = dispatch(&state, request).await;
        assert_eq!(response.result.expect("result")["protocolVersion"], DEFAULT_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let state = crate::state::AppState::for_tests(dir.path()).expect("state");
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(RpcId::Number(2)),
            method: "bogus".to_string(),
            params: serde_json::Value::Null,
        };
        let response = dispatch(&state, request).await;
        assert_eq!(response.error.expect("error").code, -32601);
    }
}
