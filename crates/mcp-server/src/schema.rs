//! MCP tool descriptors returned from `tools/list`: name, description, and a
//! JSON-schema-shaped input hint for each entry in the tool catalog.

use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn string_prop(required: &[&str], props: Value) -> Value {
    json!({"type": "object", "properties": props, "required": required})
}

pub fn tool_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "rag.search",
            description: "Hybrid BM25 + vector search over the active project's indexed chunks.",
            input_schema: string_prop(&["query"], json!({
                "query": {"type": "string"},
                "k": {"type": "integer"},
                "use_subagent": {"type": "boolean"},
                "use_iterative": {"type": "boolean"},
                "auto_index": {"type": "boolean"},
                "project": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "dual.search",
            description: "Hybrid search followed by a subagent re-rank pass, used as the first step of answer.unified.",
            input_schema: string_prop(&["query"], json!({
                "query": {"type": "string"},
                "k": {"type": "integer"},
                "include_auggie": {"type": "boolean"},
                "auto_rebuild": {"type": "boolean"},
                "project": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "answer.generate",
            description: "Single-shot, citation-grounded answer over retrieved evidence.",
            input_schema: string_prop(&["query"], json!({
                "query": {"type": "string"},
                "task_type": {"type": "string"},
                "route": {"type": "string"},
                "temperature": {"type": "number"},
                "project": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "answer.accumulated",
            description: "Decomposes a query into sub-queries, retrieves per sub-query, and synthesizes a sectioned answer.",
            input_schema: string_prop(&["query"], json!({
                "query": {"type": "string"},
                "sub_queries": {"type": "array", "items": {"type": "string"}},
                "k_per_query": {"type": "integer", "default": 5},
                "route": {"type": "string"},
                "temperature": {"type": "number"},
                "project": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "answer.unified",
            description: "Returns a two-step plan (dual.search then answer.accumulated) for a broad research query.",
            input_schema: string_prop(&["query"], json!({
                "query": {"type": "string"},
                "sub_queries": {"type": "array", "items": {"type": "string"}},
                "include_auggie": {"type": "boolean"},
                "route": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "project.init",
            description: "Registers (or re-activates) a project at a root path and optionally builds its index.",
            input_schema: string_prop(&[], json!({
                "project": {"type": "string"},
                "root": {"type": "string"},
                "build_vector": {"type": "boolean"},
            })),
        },
        ToolDescriptor {
            name: "project.status",
            description: "Returns the active project, or a named project's registry entry.",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "index.status",
            description: "Reports chunk count and vector-index availability for a project.",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "index.rebuild",
            description: "Forces a full re-scan and re-index of a project.",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}, "vector_only": {"type": "boolean"}})),
        },
        ToolDescriptor {
            name: "cache.clear",
            description: "Clears the exact and semantic answer caches for a project.",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "cache.status",
            description: "Reports cache partition status for a project.",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "memory.get",
            description: "Reads a long-term memory value scoped to a project (or global).",
            input_schema: string_prop(&["key"], json!({"key": {"type": "string"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "memory.set",
            description: "Writes a long-term memory value scoped to a project (or global).",
            input_schema: string_prop(&["key", "value"], json!({"key": {"type": "string"}, "value": {"type": "string"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "memory.list",
            description: "Lists all long-term memory entries for a project (or global).",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "memory.delete",
            description: "Deletes a long-term memory entry for a project (or global).",
            input_schema: string_prop(&["key"], json!({"key": {"type": "string"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "task.add",
            description: "Creates a task, optionally as a subtask of an existing one.",
            input_schema: string_prop(&["title"], json!({
                "title": {"type": "string"},
                "description": {"type": "string"},
                "priority": {"type": "integer"},
                "parent_id": {"type": "integer"},
                "project": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "task.get",
            description: "Fetches a single task by id.",
            input_schema: string_prop(&["id"], json!({"id": {"type": "integer"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "task.list",
            description: "Lists tasks, optionally filtered by status or parent.",
            input_schema: string_prop(&[], json!({"status": {"type": "string"}, "parent_id": {"type": "integer"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "task.update",
            description: "Updates a task's title, description, status, priority, or metadata.",
            input_schema: string_prop(&["id"], json!({
                "id": {"type": "integer"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "status": {"type": "string"},
                "priority": {"type": "integer"},
                "project": {"type": "string"},
            })),
        },
        ToolDescriptor {
            name: "task.delete",
            description: "Deletes a task, optionally deleting its subtasks recursively.",
            input_schema: string_prop(&["id"], json!({"id": {"type": "integer"}, "delete_subtasks": {"type": "boolean"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "code.symbols",
            description: "Lists symbol-like declarations (functions, types) across the project by pattern match.",
            input_schema: string_prop(&[], json!({"limit": {"type": "integer"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "code.find_symbol",
            description: "Finds every line mentioning a symbol name.",
            input_schema: string_prop(&["name"], json!({"name": {"type": "string"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "code.references",
            description: "Finds every reference to a symbol name (alias of code.find_symbol).",
            input_schema: string_prop(&["name"], json!({"name": {"type": "string"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "search.pattern",
            description: "Regex search across project files, capped at a match limit.",
            input_schema: string_prop(&["pattern"], json!({"pattern": {"type": "string"}, "limit": {"type": "integer"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "file.read",
            description: "Reads a file's contents relative to the project root, capped at a line limit.",
            input_schema: string_prop(&["path"], json!({"path": {"type": "string"}, "max_lines": {"type": "integer"}, "project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "file.list",
            description: "Lists every indexable file under the project root.",
            input_schema: string_prop(&[], json!({"project": {"type": "string"}})),
        },
        ToolDescriptor {
            name: "file.find",
            description: "Finds project files whose path contains a substring.",
            input_schema: string_prop(&["query"], json!({"query": {"type": "string"}, "project": {"type": "string"}})),
        },
    ]
}
