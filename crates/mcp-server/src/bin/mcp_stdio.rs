//! Stdio entry point: reads newline-delimited JSON-RPC requests from stdin,
//! dispatches each against `AppState`, and writes newline-delimited
//! responses to stdout, flushing after every line.

use common::rpc::{RpcError, RpcErrorCode, RpcId, RpcRequest, RpcResponse};
use mcp_server::{AppState, dispatch};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().json().with_writer(std::io::stderr).init();

    let state = AppState::from_env()?;
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&state, &line).await;
        let encoded = serde_json::to_string(&response)?;
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn handle_line(state: &AppState, line: &str) -> RpcResponse<serde_json::Value> {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "failed parsing JSON-RPC request");
            return RpcResponse::err(None, RpcError::new(RpcErrorCode::ParseError, err.to_string()));
        }
    };
    dispatch(state, request).await
}
