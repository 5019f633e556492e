//! Tool-call handlers: one function per `SPEC_FULL.md` section 6 tool,
//! operating on `&AppState` and raw JSON arguments.

use std::path::PathBuf;

use anyhow::{Result, bail};
use answer::{OrchestratorContext, answer_accumulated, answer_generate, answer_unified};
use regex::Regex;
use serde_json::{Value, json};

use crate::state::AppState;

fn project_name(params: &Value) -> &str {
    params.get("project").and_then(Value::as_str).unwrap_or("auto")
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("INVALID_INPUT: missing required param: {key}"))
}

fn usize_param(params: &Value, key: &str, default: usize) -> usize {
    params.get(key).and_then(Value::as_u64).map(|v| v as usize).unwrap_or(default)
}

fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub async fn call_tool(state: &AppState, name: &str, params: Value) -> Result<Value> {
    match name {
        "rag.search" => rag_search(state, params).await,
        "dual.search" => dual_search(state, params).await,
        "answer.generate" => answer_generate_tool(state, params).await,
        "answer.accumulated" => answer_accumulated_tool(state, params).await,
        "answer.unified" => answer_unified_tool(params),
        "project.init" => project_init(state, params).await,
        "project.status" => project_status(state, params).await,
        "index.status" => index_status(state, params).await,
        "index.rebuild" => index_rebuild(state, params).await,
        "cache.clear" => cache_clear(state, params).await,
        "cache.status" => cache_status(state, params),
        "memory.get" => memory_get(state, params),
        "memory.set" => memory_set(state, params),
        "memory.list" => memory_list(state, params),
        "memory.delete" => memory_delete(state, params),
        "task.add" => task_add(state, params),
        "task.get" => task_get(state, params),
        "task.list" => task_list(state, params),
        "task.update" => task_update(state, params),
        "task.delete" => task_delete(state, params),
        "code.symbols" => code_symbols(state, params).await,
        "code.find_symbol" => code_find_symbol(state, params).await,
        "code.references" => code_references(state, params).await,
        "search.pattern" => search_pattern(state, params).await,
        "file.read" => file_read(state, params).await,
        "file.list" => file_list(state, params).await,
        "file.find" => file_find(state, params).await,
        other => bail!("unknown tool: {other}"),
    }
}

async fn rag_search(state: &AppState, params: Value) -> Result<Value> {
    let query = str_param(&params, "query")?;
    let k = usize_param(&params, "k", 8);
    let use_subagent = bool_param(&params, "use_subagent", true);
    let use_iterative = bool_param(&params, "use_iterative", false);
    let auto_index = bool_param(&params, "auto_index", true);

    let project = state.resolve_project(project_name(&params)).await?;
    let store_handle = state.store_for(&project).await?;
    let mut store = store_handle.lock().await;
    if auto_index {
        store.auto_index_if_needed().await?;
    }

    let hits = if use_iterative {
        answer::iterative_search(
            &store,
            &state.llm,
            "general",
            query,
            answer::IterativeConfig { k_per_iteration: k, ..answer::IterativeConfig::default() },
        )
        .await?
    } else {
        let raw = store.hybrid_search(query, k, state.config.bm25_weight, state.config.vector_weight).await?;
        if use_subagent {
            answer::subagent_filter(&state.llm, "general", query, &raw, k).await
        } else {
            raw
        }
    };

    Ok(json!({"ok": true, "hits": hits}))
}

async fn dual_search(state: &AppState, params: Value) -> Result<Value> {
    let query = str_param(&params, "query")?;
    let k = usize_param(&params, "k", 8);
    let auto_rebuild = bool_param(&params, "auto_rebuild", true);
    let include_auggie = bool_param(&params, "include_auggie", true);

    let project = state.resolve_project(project_name(&params)).await?;
    let store_handle = state.store_for(&project).await?;
    let mut store = store_handle.lock().await;
    let rebuild_stats = if auto_rebuild { store.auto_index_if_needed().await? } else { None };
    let hits = store.hybrid_search(query, k, state.config.bm25_weight, state.config.vector_weight).await?;
    let filtered = answer::subagent_filter(&state.llm, "general", query, &hits, k).await;

    // Local hybrid search always runs; no sibling `auggie` MCP process is wired
    // up in this deployment, so the external engine is never actually invoked
    // and we surface a hint instead of guessing a transport (SPEC_FULL.md §9,
    // Open Question 2).
    let auggie_hint = include_auggie.then(|| {
        json!({
            "tool": "auggie.search",
            "note": "no auggie transport is configured; the caller may invoke its own auggie MCP server with this query and fan the results in",
            "query": query,
            "k": k,
        })
    });

    Ok(json!({
        "ok": true,
        "hits": filtered.clone(),
        "sources": {"augment_lite": filtered, "auggie": Value::Null},
        "auggie_available": false,
        "auggie_hint": auggie_hint,
        "index_rebuilt": rebuild_stats.is_some(),
        "rebuild_info": rebuild_stats,
    }))
}

async fn answer_generate_tool(state: &AppState, params: Value) -> Result<Value> {
    let query = str_param(&params, "query")?;
    let task_type = params.get("task_type").and_then(Value::as_str).unwrap_or("lookup");
    let route = params.get("route").and_then(Value::as_str).filter(|r| *r != "auto");
    let temperature = params.get("temperature").and_then(Value::as_f64).unwrap_or(0.2) as f32;

    let project = state.resolve_project(project_name(&params)).await?;
    let store_handle = state.store_for(&project).await?;
    let mut store = store_handle.lock().await;
    store.auto_index_if_needed().await?;

    let ctx = OrchestratorContext {
        store: &store,
        cache: &state.cache,
        llm: &state.llm,
        router_config: &state.router_config,
        project: &project.name,
    };
    let result = answer_generate(&ctx, query, task_type, route, temperature).await?;
    Ok(serde_json::to_value(result)?)
}

async fn answer_accumulated_tool(state: &AppState, params: Value) -> Result<Value> {
    let query = str_param(&params, "query")?;
    let sub_queries = params
        .get("sub_queries")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>());
    let route = params.get("route").and_then(Value::as_str).or(Some("reason-large"));
    let temperature = params.get("temperature").and_then(Value::as_f64).unwrap_or(0.2) as f32;
    let k_per_query = params.get("k_per_query").and_then(Value::as_u64).map(|v| v as usize);

    let project = state.resolve_project(project_name(&params)).await?;
    let store_handle = state.store_for(&project).await?;
    let mut store = store_handle.lock().await;
    store.auto_index_if_needed().await?;

    let ctx = OrchestratorContext {
        store: &store,
        cache: &state.cache,
        llm: &state.llm,
        router_config: &state.router_config,
        project: &project.name,
    };
    let result = answer_accumulated(&ctx, query, sub_queries, k_per_query, route, temperature).await?;
    Ok(serde_json::to_value(result)?)
}

fn answer_unified_tool(params: Value) -> Result<Value> {
    let query = str_param(&params, "query")?;
    let sub_queries = params
        .get("sub_queries")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>());
    let include_auggie = bool_param(&params, "include_auggie", true);
    let route = params.get("route").and_then(Value::as_str);
    let plan = answer_unified(query, sub_queries, include_auggie, route);
    Ok(serde_json::to_value(plan)?)
}

async fn project_init(state: &AppState, params: Value) -> Result<Value> {
    let requested = params.get("project").and_then(Value::as_str).unwrap_or("auto");
    let root = params.get("root").and_then(Value::as_str).map(PathBuf::from).unwrap_or_else(|| state.cwd.clone());
    let name = if requested == "auto" {
        let raw = root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "project".to_string());
        common::project::sanitize_project_name(&raw)
    } else {
        requested.to_string()
    };

    let project = state.init_project(&name, root).await?;
    let build_vector = bool_param(&params, "build_vector", true);
    let stats = if build_vector {
        let store_handle = state.store_for(&project).await?;
        let mut store = store_handle.lock().await;
        store.auto_index_if_needed().await?
    } else {
        None
    };

    Ok(json!({"ok": true, "project": project.name, "id": project.id, "root": project.root, "index_stats": stats}))
}

async fn project_status(state: &AppState, params: Value) -> Result<Value> {
    if let Some(requested) = params.get("project").and_then(Value::as_str).filter(|r| *r != "auto") {
        let project = state.resolve_project(requested).await?;
        return Ok(json!({"ok": true, "project": project}));
    }
    let projects = state.list_projects().await;
    Ok(json!({"ok": true, "projects": projects}))
}

async fn index_status(state: &AppState, params: Value) -> Result<Value> {
    let project = state.resolve_project(project_name(&params)).await?;
    let store_handle = state.store_for(&project).await?;
    let store = store_handle.lock().await;
    Ok(json!({
        "ok": true,
        "project": project.name,
        "chunk_count": store.chunk_count(),
        "has_vector_index": store.has_vector_index(),
    }))
}

async fn index_rebuild(state: &AppState, params: Value) -> Result<Value> {
    let vector_only = bool_param(&params, "vector_only", false);
    let project = state.resolve_project(project_name(&params)).await?;
    if !vector_only {
        state.evict_store(&project.name).await;
    }
    let store_handle = state.store_for(&project).await?;
    let mut store = store_handle.lock().await;
    let stats = if vector_only {
        store.rebuild_vector_only().await?
    } else {
        store.rebuild_all().await?
    };
    Ok(json!({"ok": true, "project": project.name, "vector_only": vector_only, "stats": stats}))
}

async fn cache_clear(state: &AppState, params: Value) -> Result<Value> {
    let project = state.resolve_project(project_name(&params)).await?;
    state.cache.clear(&project.name)?;
    Ok(json!({"ok": true, "project": project.name}))
}

fn cache_status(state: &AppState, params: Value) -> Result<Value> {
    let project = project_name(&params);
    let exact_entries = state.cache.exact().count(project)?;
    let semantic_entries = state.cache.with_semantic(project, cache::SemanticCache::len)?;
    Ok(json!({
        "ok": true,
        "project": project,
        "exact_entries": exact_entries,
        "semantic_entries": semantic_entries,
    }))
}

fn memory_scope(params: &Value) -> Option<String> {
    params.get("project").and_then(Value::as_str).filter(|p| !p.is_empty() && *p != "auto").map(str::to_string)
}

fn memory_get(state: &AppState, params: Value) -> Result<Value> {
    let key = str_param(&params, "key")?;
    let scope = memory_scope(&params);
    let value = state.memory.get(scope.as_deref(), key)?;
    Ok(json!({"ok": true, "key": key, "value": value}))
}

fn memory_set(state: &AppState, params: Value) -> Result<Value> {
    let key = str_param(&params, "key")?;
    let value = str_param(&params, "value")?;
    let scope = memory_scope(&params);
    state.memory.set(scope.as_deref(), key, value)?;
    Ok(json!({"ok": true}))
}

fn memory_list(state: &AppState, params: Value) -> Result<Value> {
    let scope = memory_scope(&params);
    let entries = state.memory.list(scope.as_deref())?;
    Ok(json!({"ok": true, "entries": entries}))
}

fn memory_delete(state: &AppState, params: Value) -> Result<Value> {
    let key = str_param(&params, "key")?;
    let scope = memory_scope(&params);
    let deleted = state.memory.delete(scope.as_deref(), key)?;
    Ok(json!({"ok": true, "deleted": deleted}))
}

fn task_add(state: &AppState, params: Value) -> Result<Value> {
    let title = str_param(&params, "title")?;
    let description = params.get("description").and_then(Value::as_str);
    let priority = params.get("priority").and_then(Value::as_i64).unwrap_or(0);
    let parent_id = params.get("parent_id").and_then(Value::as_i64);
    let metadata = params.get("metadata").map(|v| v.to_string());
    let project = project_name(&params);
    let id = state.tasks.add(project, title, description, priority, parent_id, metadata.as_deref())?;
    Ok(json!({"ok": true, "id": id}))
}

fn task_get(state: &AppState, params: Value) -> Result<Value> {
    let id = params.get("id").and_then(Value::as_i64).ok_or_else(|| anyhow::anyhow!("INVALID_INPUT: missing id"))?;
    let project = project_name(&params);
    let task = state.tasks.get(project, id)?;
    Ok(json!({"ok": true, "task": task}))
}

fn task_list(state: &AppState, params: Value) -> Result<Value> {
    let project = project_name(&params);
    let status = params.get("status").and_then(Value::as_str);
    let parent_id = params.get("parent_id").and_then(Value::as_i64);
    let tasks = state.tasks.list(project, status, parent_id)?;
    Ok(json!({"ok": true, "tasks": tasks}))
}

fn task_update(state: &AppState, params: Value) -> Result<Value> {
    let id = params.get("id").and_then(Value::as_i64).ok_or_else(|| anyhow::anyhow!("INVALID_INPUT: missing id"))?;
    let project = project_name(&params);
    let title = params.get("title").and_then(Value::as_str);
    let description = params.get("description").and_then(Value::as_str);
    let status = params.get("status").and_then(Value::as_str);
    let priority = params.get("priority").and_then(Value::as_i64);
    let metadata = params.get("metadata").map(|v| v.to_string());
    let updated = state.tasks.update(project, id, title, description, status, priority, metadata.as_deref())?;
    Ok(json!({"ok": true, "updated": updated}))
}

fn task_delete(state: &AppState, params: Value) -> Result<Value> {
    let id = params.get("id").and_then(Value::as_i64).ok_or_else(|| anyhow::anyhow!("INVALID_INPUT: missing id"))?;
    let project = project_name(&params);
    let delete_subtasks = bool_param(&params, "delete_subtasks", false);
    let deleted = state.tasks.delete(project, id, delete_subtasks)?;
    Ok(json!({"ok": true, "deleted": deleted}))
}

const SYMBOL_PATTERN: &str = r"(?m)^\s*(?:pub\s+)?(?:async\s+)?(?:fn|struct|enum|trait|impl|class|def|function|interface|type)\s+([A-Za-z_][A-Za-z0-9_]*)";

async fn code_symbols(state: &AppState, params: Value) -> Result<Value> {
    let project = state.resolve_project(project_name(&params)).await?;
    let re = Regex::new(SYMBOL_PATTERN)?;
    let limit = usize_param(&params, "limit", 500);
    let mut symbols = Vec::new();

    for file in indexer::scan_project(&project.root) {
        let Ok(content) = std::fs::read_to_string(&file.abspath) else { continue };
        for (line_no, line) in content.lines().enumerate() {
            if let Some(caps) = re.captures(line) {
                symbols.push(json!({"name": &caps[1], "file": file.relpath, "line": line_no + 1}));
                if symbols.len() >= limit {
                    return Ok(json!({"ok": true, "symbols": symbols, "truncated": true}));
                }
            }
        }
    }
    Ok(json!({"ok": true, "symbols": symbols, "truncated": false}))
}

async fn code_find_symbol(state: &AppState, params: Value) -> Result<Value> {
    let name = str_param(&params, "name")?;
    let project = state.resolve_project(project_name(&params)).await?;
    let re = Regex::new(&format!(r"(?m)\b{}\b", regex::escape(name)))?;
    let mut matches = Vec::new();

    for file in indexer::scan_project(&project.root) {
        let Ok(content) = std::fs::read_to_string(&file.abspath) else { continue };
        for (line_no, line) in content.lines().enumerate() {
            if re.is_match(line) {
                matches.push(json!({"file": file.relpath, "line": line_no + 1, "text": line.trim()}));
            }
        }
    }
    Ok(json!({"ok": true, "matches": matches}))
}

async fn code_references(state: &AppState, params: Value) -> Result<Value> {
    code_find_symbol(state, params).await
}

async fn search_pattern(state: &AppState, params: Value) -> Result<Value> {
    let pattern = str_param(&params, "pattern")?;
    let project = state.resolve_project(project_name(&params)).await?;
    let re = Regex::new(pattern)?;
    let limit = usize_param(&params, "limit", 200);
    let mut matches = Vec::new();

    'files: for file in indexer::scan_project(&project.root) {
        let Ok(content) = std::fs::read_to_string(&file.abspath) else { continue };
        for (line_no, line) in content.lines().enumerate() {
            if re.is_match(line) {
                matches.push(json!({"file": file.relpath, "line": line_no + 1, "text": line.trim()}));
                if matches.len() >= limit {
                    break 'files;
                }
            }
        }
    }
    Ok(json!({"ok": true, "matches": matches}))
}

async fn file_read(state: &AppState, params: Value) -> Result<Value> {
    let path = str_param(&params, "path")?;
    let project = state.resolve_project(project_name(&params)).await?;
    let full = project.root.join(path);
    let canonical_root = std::fs::canonicalize(&project.root)
        .map_err(|err| anyhow::anyhow!("INVALID_INPUT: project root is not accessible: {err}"))?;
    let canonical_full = std::fs::canonicalize(&full)
        .map_err(|_| anyhow::anyhow!("INVALID_INPUT: path escapes project root: {path}"))?;
    if !canonical_full.starts_with(&canonical_root) {
        bail!("INVALID_INPUT: path escapes project root: {path}");
    }
    let content = std::fs::read_to_string(&canonical_full)?;
    let max_lines = usize_param(&params, "max_lines", 2000);
    let truncated: String = content.lines().take(max_lines).collect::<Vec<_>>().join("\n");
    Ok(json!({"ok": true, "path": path, "content": truncated}))
}

async fn file_list(state: &AppState, params: Value) -> Result<Value> {
    let project = state.resolve_project(project_name(&params)).await?;
    let files: Vec<String> = indexer::scan_project(&project.root).into_iter().map(|f| f.relpath).collect();
    Ok(json!({"ok": true, "files": files}))
}

async fn file_find(state: &AppState, params: Value) -> Result<Value> {
    let needle = str_param(&params, "query")?.to_lowercase();
    let project = state.resolve_project(project_name(&params)).await?;
    let files: Vec<String> = indexer::scan_project(&project.root)
        .into_iter()
        .map(|f| f.relpath)
        .filter(|p| p.to_lowercase().contains(&needle))
        .collect();
    Ok(json!({"ok": true, "files": files}))
}
