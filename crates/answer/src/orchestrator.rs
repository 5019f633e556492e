//! Answer orchestrator (C13): wires retrieval, the abstain guardrail, the
//! model router, the response cache, and the LLM client into the three
//! public answer operations (`SPEC_FULL.md` section 4.13).

use anyhow::Result;
use cache::{CacheStore, DEFAULT_ANSWER_TTL_SECS, compute_cache_key, evidence_fingerprint};
use common::Hit;
use common::tokens::{Message, MessageContent, estimate_tokens_from_messages};
use indexer::ProjectStore;
use router::{RouterConfig, get_route_config};
use serde::{Deserialize, Serialize};

use crate::accumulator::{AccumulatedHit, AccumulatorConfig, SearchMetadataEntry, accumulated_search};
use crate::guardrail::{AbstainThresholds, get_abstain_reason};
use crate::iterative::{IterativeConfig, iterative_search, should_use_iterative};
use crate::llm::LlmClient;
use crate::subagent::subagent_filter;

const GENERATE_RETRIEVE_K: usize = 8;
const GENERATE_EVIDENCE_K: usize = 5;
const ACCUMULATED_EVIDENCE_K: usize = 12;

const GENERATE_SYSTEM_PROMPT: &str = "You answer strictly from the evidence provided. \
Cite every claim with a [source:file:line] marker taken from the evidence. \
If the evidence does not cover the question, reply exactly with \"I don't know\" instead of guessing.";

const ACCUMULATED_SYSTEM_PROMPT: &str = "You answer strictly from the evidence provided, grouped by sub-query. \
Produce a sectioned answer with one section per aspect of the question, citing each claim with a \
[source:file:line] marker. For any aspect the evidence does not cover, add an explicit \"missing\" note \
instead of guessing.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub ok: bool,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstained: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatedAnswerResult {
    #[serde(flatten)]
    pub answer: AnswerResult,
    pub sub_queries: Vec<String>,
    pub search_metadata: Vec<SearchMetadataEntry>,
    pub evidence_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedPlanStep {
    pub tool: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedPlan {
    pub ok: bool,
    pub plan_type: &'static str,
    pub total_steps: usize,
    pub steps: Vec<UnifiedPlanStep>,
    pub execution_hint: String,
}

pub struct OrchestratorContext<'a> {
    pub store: &'a ProjectStore,
    pub cache: &'a CacheStore,
    pub llm: &'a LlmClient,
    pub router_config: &'a RouterConfig,
    pub project: &'a str,
}

pub async fn answer_generate(
    ctx: &OrchestratorContext<'_>,
    query: &str,
    task_type: &str,
    route_override: Option<&str>,
    temperature: f32,
) -> Result<AnswerResult> {
    let iterative = should_use_iterative(task_type, query);
    let mut hits = if iterative {
        iterative_search(ctx.store, ctx.llm, "general", query, IterativeConfig { k_per_iteration: GENERATE_RETRIEVE_K, ..IterativeConfig::default() }).await?
    } else {
        let raw = ctx.store.hybrid_search(query, GENERATE_RETRIEVE_K, 0.5, 0.5).await?;
        subagent_filter(ctx.llm, "general", query, &raw, GENERATE_RETRIEVE_K).await
    };
    hits.truncate(GENERATE_EVIDENCE_K);

    let thresholds = AbstainThresholds { min_diversity: 2, ..AbstainThresholds::default() };
    if let Some(code) = get_abstain_reason(&hits, thresholds) {
        return Ok(AnswerResult {
            ok: true,
            answer: format!("Search failed: {code}"),
            citations: Vec::new(),
            cached: false,
            abstained: Some(true),
        });
    }

    let messages = build_generate_messages(query, &hits);
    let route = resolve_route(ctx, task_type, &messages, route_override);
    let fingerprints: Vec<String> = hits.iter().map(|h| evidence_fingerprint(&h.source, &h.text)).collect();
    let cache_key = compute_cache_key(&route.model, &messages, &serde_json::json!({"task_type": task_type}), &fingerprints);

    if let Some(cached) = ctx.cache.exact().get(ctx.project, &cache_key)? {
        let cached: CachedAnswer = serde_json::from_str(&cached)?;
        return Ok(AnswerResult { ok: true, answer: cached.answer, citations: cached.citations, cached: true, abstained: None });
    }

    let answer_text = ctx.llm.chat(&route.model, &messages, temperature, route.max_output_tokens).await?;
    let citations = hits.iter().map(|h| Citation { source: h.source.clone(), text: h.text.clone() }).collect::<Vec<_>>();

    let to_store = CachedAnswer { answer: answer_text.clone(), citations: citations.clone() };
    ctx.cache.exact().set(ctx.project, &cache_key, &serde_json::to_string(&to_store)?, DEFAULT_ANSWER_TTL_SECS)?;

    Ok(AnswerResult { ok: true, answer: answer_text, citations, cached: false, abstained: None })
}

pub async fn answer_accumulated(
    ctx: &OrchestratorContext<'_>,
    query: &str,
    sub_queries: Option<Vec<String>>,
    k_per_query: Option<usize>,
    route_override: Option<&str>,
    temperature: f32,
) -> Result<AccumulatedAnswerResult> {
    let config = AccumulatorConfig {
        k_per_query: k_per_query.unwrap_or(crate::accumulator::DEFAULT_K_PER_QUERY),
        ..AccumulatorConfig::default()
    };
    let accumulated = accumulated_search(ctx.store, ctx.llm, "general", query, sub_queries, config).await?;

    let used_sub_queries: Vec<String> = {
        let mut seen = Vec::new();
        for item in &accumulated.hits {
            if !seen.contains(&item.sub_query) {
                seen.push(item.sub_query.clone());
            }
        }
        seen
    };
    let search_metadata = accumulated.search_metadata;

    let mut hits: Vec<Hit> = accumulated.hits.into_iter().map(|item: AccumulatedHit| item.hit).collect();
    hits.truncate(ACCUMULATED_EVIDENCE_K);

    let thresholds = AbstainThresholds { min_diversity: 2, ..AbstainThresholds::default() };
    if let Some(code) = get_abstain_reason(&hits, thresholds) {
        let answer = AnswerResult {
            ok: true,
            answer: format!("Search failed: {code}"),
            citations: Vec::new(),
            cached: false,
            abstained: Some(true),
        };
        return Ok(AccumulatedAnswerResult { answer, sub_queries: used_sub_queries, search_metadata, evidence_count: 0 });
    }

    let messages = build_accumulated_messages(query, &hits);
    let route = resolve_route(ctx, "reason", &messages, route_override.or(Some("reason-large")));
    let fingerprints: Vec<String> = hits.iter().map(|h| evidence_fingerprint(&h.source, &h.text)).collect();
    let cache_key = compute_cache_key(&route.model, &messages, &serde_json::json!({"mode": "accumulated"}), &fingerprints);

    if let Some(cached) = ctx.cache.exact().get(ctx.project, &cache_key)? {
        let cached: CachedAnswer = serde_json::from_str(&cached)?;
        let answer = AnswerResult { ok: true, answer: cached.answer, citations: cached.citations, cached: true, abstained: None };
        return Ok(AccumulatedAnswerResult { answer, sub_queries: used_sub_queries, search_metadata, evidence_count: hits.len() });
    }

    let answer_text = ctx.llm.chat(&route.model, &messages, temperature, route.max_output_tokens).await?;
    let citations = hits.iter().map(|h| Citation { source: h.source.clone(), text: h.text.clone() }).collect::<Vec<_>>();

    let to_store = CachedAnswer { answer: answer_text.clone(), citations: citations.clone() };
    ctx.cache.exact().set(ctx.project, &cache_key, &serde_json::to_string(&to_store)?, DEFAULT_ANSWER_TTL_SECS)?;

    let evidence_count = citations.len();
    let answer = AnswerResult { ok: true, answer: answer_text, citations, cached: false, abstained: None };
    Ok(AccumulatedAnswerResult { answer, sub_queries: used_sub_queries, search_metadata, evidence_count })
}

#[must_use]
pub fn answer_unified(query: &str, sub_queries: Option<Vec<String>>, include_auggie: bool, route: Option<&str>) -> UnifiedPlan {
    let dual_search_params = serde_json::json!({
        "query": query,
        "k": GENERATE_RETRIEVE_K,
        "include_auggie": include_auggie,
    });
    let accumulated_params = serde_json::json!({
        "query": query,
        "sub_queries": sub_queries,
        "k_per_query": 5,
        "route": route.unwrap_or("reason-large"),
    });

    let steps = vec![
        UnifiedPlanStep { tool: "dual.search".to_string(), params: dual_search_params },
        UnifiedPlanStep { tool: "answer.accumulated".to_string(), params: accumulated_params },
    ];

    UnifiedPlan {
        ok: true,
        plan_type: "unified_search",
        total_steps: steps.len(),
        execution_hint: "Run dual.search first to gather broad evidence, then feed its sub-queries \
            into answer.accumulated to synthesize a sectioned answer."
            .to_string(),
        steps,
    }
}

fn resolve_route(ctx: &OrchestratorContext<'_>, task_type: &str, messages: &[Message], route_override: Option<&str>) -> router::RouteConfig {
    let total_tokens_est = estimate_tokens_from_messages(messages);
    get_route_config(ctx.router_config, task_type, total_tokens_est, route_override)
}

fn build_generate_messages(query: &str, hits: &[Hit]) -> Vec<Message> {
    let evidence = format_evidence(hits);
    vec![
        Message { role: "system".to_string(), content: MessageContent::Text(GENERATE_SYSTEM_PROMPT.to_string()) },
        Message {
            role: "user".to_string(),
            content: MessageContent::Text(format!("Question: {query}\n\nEvidence:\n{evidence}")),
        },
    ]
}

fn build_accumulated_messages(query: &str, hits: &[Hit]) -> Vec<Message> {
    let evidence = format_evidence(hits);
    vec![
        Message { role: "system".to_string(), content: MessageContent::Text(ACCUMULATED_SYSTEM_PROMPT.to_string()) },
        Message {
            role: "user".to_string(),
            content: MessageContent::Text(format!("Question: {query}\n\nEvidence:\n{evidence}")),
        },
    ]
}

fn format_evidence(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| format!("[source:{}] (score={:.3})\n{}", h.source, h.score, h.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Serialize, Deserialize)]
struct CachedAnswer {
    answer: String,
    citations: Vec<Citation>,
}

#[cfg(test)]
mod tests {
    use super::answer_unified;

    #[test]
    fn unified_plan_describes_dual_search_then_accumulated() {
        let plan = answer_unified("find the parser", None, true, None);
        assert!(plan.ok);
        assert_eq!(plan.plan_type, "unified_search");
        assert_eq!(plan.total_steps, 2);
        assert_eq!(plan.steps[0].tool, "dual.search");
        assert_eq!(plan.steps[1].tool, "answer.accumulated");
    }
}
