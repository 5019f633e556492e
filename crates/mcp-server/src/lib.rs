//! Pure stdio JSON-RPC MCP server: project registry, incremental index,
//! hybrid search, answer generation, memory, and task tracking, all reached
//! through a single line-delimited JSON-RPC transport.

pub mod dispatch;
pub mod handlers;
pub mod memory_store;
pub mod schema;
pub mod state;
pub mod task_store;

pub use dispatch::dispatch;
pub use state::AppState;
