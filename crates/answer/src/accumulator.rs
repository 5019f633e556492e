//! Accumulated searcher (C9): decomposes a query into sub-queries and merges
//! their hybrid-search results (`SPEC_FULL.md` section 4.9).

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use common::Hit;
use common::tokens::{Message, MessageContent};
use indexer::ProjectStore;
use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::subagent::subagent_filter;

const MIN_SUB_QUERIES: usize = 3;
const MAX_SUB_QUERIES: usize = 5;

/// Default results requested per sub-query, matching `answer.accumulated`'s
/// documented `k_per_query=5` default (`SPEC_FULL.md` section 6).
pub const DEFAULT_K_PER_QUERY: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct AccumulatorConfig {
    pub k_per_query: usize,
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub use_subagent: bool,
    pub subagent_max_results: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            k_per_query: DEFAULT_K_PER_QUERY,
            bm25_weight: 0.5,
            vector_weight: 0.5,
            use_subagent: true,
            subagent_max_results: 8,
        }
    }
}

/// A hit tagged with the sub-query and round that produced it.
#[derive(Debug, Clone)]
pub struct AccumulatedHit {
    pub hit: Hit,
    pub sub_query: String,
    pub round: usize,
}

/// Per-sub-query bookkeeping returned alongside the merged hits, matching
/// `original_source/retrieval/accumulated_answer.py`'s `search_metadata`
/// entries: either `{query, found, new}` on success or `{query, error}` if
/// that sub-query's search failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadataEntry {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccumulatedSearchResult {
    pub hits: Vec<AccumulatedHit>,
    pub search_metadata: Vec<SearchMetadataEntry>,
}

pub async fn accumulated_search(
    store: &ProjectStore,
    llm: &LlmClient,
    model: &str,
    query: &str,
    sub_queries: Option<Vec<String>>,
    config: AccumulatorConfig,
) -> Result<AccumulatedSearchResult> {
    let sub_queries = match sub_queries {
        Some(queries) if !queries.is_empty() => queries,
        _ => decompose_query(llm, model, query).await,
    };

    let mut best: HashMap<String, AccumulatedHit> = HashMap::new();
    let mut seen_sources: HashSet<String> = HashSet::new();
    let mut search_metadata = Vec::with_capacity(sub_queries.len());

    for (round, sub_query) in sub_queries.iter().enumerate() {
        let hits = match store.hybrid_search(sub_query, config.k_per_query, config.bm25_weight, config.vector_weight).await {
            Ok(mut hits) => {
                if config.use_subagent {
                    hits = subagent_filter(llm, model, sub_query, &hits, config.subagent_max_results).await;
                }
                hits
            }
            Err(err) => {
                search_metadata.push(SearchMetadataEntry {
                    query: sub_query.clone(),
                    found: None,
                    new: None,
                    error: Some(err.to_string()),
                });
                continue;
            }
        };

        let found = hits.len();
        let mut new_count = 0;
        for hit in hits {
            if seen_sources.insert(hit.source.clone()) {
                new_count += 1;
            }
            let candidate = AccumulatedHit { hit: hit.clone(), sub_query: sub_query.clone(), round };
            best.entry(hit.source.clone())
                .and_modify(|existing| {
                    if hit.score > existing.hit.score {
                        *existing = candidate.clone();
                    }
                })
                .or_insert(candidate);
        }
        search_metadata.push(SearchMetadataEntry { query: sub_query.clone(), found: Some(found), new: Some(new_count), error: None });
    }

    let mut out: Vec<AccumulatedHit> = best.into_values().collect();
    out.sort_by(|a, b| b.hit.score.total_cmp(&a.hit.score));
    Ok(AccumulatedSearchResult { hits: out, search_metadata })
}

/// Asks the LLM to split `query` into 3-5 sub-queries, one per line. Falls
/// back to treating the original query as the sole sub-query if the LLM call
/// fails or returns something unusable.
async fn decompose_query(llm: &LlmClient, model: &str, query: &str) -> Vec<String> {
    let prompt = format!(
        "Break the following query into {MIN_SUB_QUERIES} to {MAX_SUB_QUERIES} focused \
         sub-queries, one per line, with no numbering or extra commentary.\n\nQuery: {query}"
    );
    let messages = vec![Message { role: "user".to_string(), content: MessageContent::Text(prompt) }];

    let response = match llm.chat(model, &messages, 0.2, 256).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "sub-query decomposition failed; falling back to the original query");
            return vec![query.to_string()];
        }
    };

    let sub_queries: Vec<String> = response
        .lines()
        .map(strip_numbering)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .take(MAX_SUB_QUERIES)
        .collect();

    if sub_queries.is_empty() {
        vec![query.to_string()]
    } else {
        sub_queries
    }
}

fn strip_numbering(line: &str) -> &str {
    let trimmed = line.trim_start();
    let without_digits = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
    without_digits
        .strip_prefix('.')
        .or_else(|| without_digits.strip_prefix(')'))
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::strip_numbering;

    #[test]
    fn strips_leading_numbering_styles() {
        assert_eq!(strip_numbering("1. find the parser"), " find the parser");
        assert_eq!(strip_numbering("2) find the lexer"), " find the lexer");
        assert_eq!(strip_numbering("- find the cache"), " find the cache");
        assert_eq!(strip_numbering("plain query"), "plain query");
    }
}
