//! Iterative searcher (C8): multi-round retrieval with LLM-driven query
//! expansion (`SPEC_FULL.md` section 4.8).

use std::collections::HashMap;

use anyhow::Result;
use common::Hit;
use common::tokens::{Message, MessageContent};
use indexer::ProjectStore;

use crate::llm::LlmClient;
use crate::subagent::subagent_filter;

const MAX_EXPANSION_CHARS: usize = 200;

/// Multilingual connective tokens used by the auto-trigger heuristic. Not
/// exhaustive — just enough signal that a query reads as multi-clause.
const CONNECTIVES: &[&str] = &[
    "and", "but", "however", "because", "therefore", "moreover", "although", "while", "then",
    "und", "aber", "jedoch", "weil", "deshalb",
    "pero", "porque", "entonces", "y",
    "donc", "mais", "parce",
    "而且", "但是", "因为", "所以", "然后",
];

#[derive(Debug, Clone, Copy)]
pub struct IterativeConfig {
    pub max_iterations: usize,
    pub min_quality_score: f32,
    pub min_results: usize,
    pub k_per_iteration: usize,
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub use_subagent: bool,
    pub subagent_max_results: usize,
}

impl Default for IterativeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_quality_score: 0.7,
            min_results: 5,
            k_per_iteration: 8,
            bm25_weight: 0.5,
            vector_weight: 0.5,
            use_subagent: true,
            subagent_max_results: 8,
        }
    }
}

/// Whether a query should use iterative retrieval rather than a single hybrid
/// search pass.
#[must_use]
pub fn should_use_iterative(task_type: &str, query: &str) -> bool {
    if matches!(task_type, "refactor" | "reason" | "implement") {
        return true;
    }
    if query.chars().count() > 50 {
        return true;
    }
    let lowercase = query.to_lowercase();
    let connective_count = CONNECTIVES.iter().filter(|c| lowercase.contains(**c)).count();
    connective_count >= 2
}

pub async fn iterative_search(
    store: &ProjectStore,
    llm: &LlmClient,
    model: &str,
    query: &str,
    config: IterativeConfig,
) -> Result<Vec<Hit>> {
    let mut accumulated: HashMap<String, Hit> = HashMap::new();
    let mut current_query = query.to_string();

    for iteration in 0..config.max_iterations.max(1) {
        let mut hits = store
            .hybrid_search(&current_query, config.k_per_iteration, config.bm25_weight, config.vector_weight)
            .await?;
        if config.use_subagent {
            hits = subagent_filter(llm, model, &current_query, &hits, config.subagent_max_results).await;
        }

        for hit in hits {
            accumulated
                .entry(hit.source.clone())
                .and_modify(|existing| {
                    if hit.score > existing.score {
                        *existing = hit.clone();
                    }
                })
                .or_insert(hit);
        }

        let above_quality = accumulated.values().filter(|h| h.score >= config.min_quality_score).count();
        if above_quality >= config.min_results {
            break;
        }
        if iteration + 1 >= config.max_iterations {
            break;
        }

        let top_sources: Vec<String> = {
            let mut hits: Vec<&Hit> = accumulated.values().collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.into_iter().take(5).map(|h| h.source.clone()).collect()
        };

        match expand_query(llm, model, query, &top_sources, iteration + 1, &current_query).await {
            Some(expanded) => current_query = expanded,
            None => break,
        }
    }

    let mut out: Vec<Hit> = accumulated.into_values().collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(config.k_per_iteration.saturating_mul(2));
    Ok(out)
}

async fn expand_query(
    llm: &LlmClient,
    model: &str,
    original_query: &str,
    top_sources: &[String],
    iteration_number: usize,
    current_query: &str,
) -> Option<String> {
    let prompt = format!(
        "Original query: {original_query}\nIteration: {iteration_number}\nCurrent top sources: {}\n\n\
         Suggest one short alternative phrasing of the query to surface different evidence. \
         Reply with only the rephrased query, nothing else.",
        top_sources.join(", ")
    );
    let messages = vec![Message { role: "user".to_string(), content: MessageContent::Text(prompt) }];

    let response = llm.chat(model, &messages, 0.3, 128).await.ok()?;
    let candidate = response.trim().to_string();
    if candidate.is_empty() || candidate.chars().count() > MAX_EXPANSION_CHARS || candidate == current_query {
        return None;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::should_use_iterative;

    #[test]
    fn task_type_forces_iterative_mode() {
        assert!(should_use_iterative("refactor", "short"));
        assert!(should_use_iterative("reason", "short"));
        assert!(should_use_iterative("implement", "short"));
        assert!(!should_use_iterative("lookup", "short"));
    }

    #[test]
    fn long_query_triggers_iterative_mode() {
        let long_query = "a".repeat(51);
        assert!(should_use_iterative("lookup", &long_query));
    }

    #[test]
    fn multiple_connectives_trigger_iterative_mode() {
        assert!(should_use_iterative("lookup", "find the parser but also fix it because it is broken"));
        assert!(!should_use_iterative("lookup", "find the parser"));
    }
}
