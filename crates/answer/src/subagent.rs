//! Subagent filter (C7): an LLM-driven re-rank of a candidate pool down to
//! `max_results` (`SPEC_FULL.md` section 4.7).

use common::Hit;
use common::tokens::{Message, MessageContent};

use crate::llm::LlmClient;

const PREVIEW_CHARS: usize = 200;

/// Re-ranks `candidates` via a single LLM call. Candidates already at or
/// under `max_results` are returned unchanged. Any LLM failure or unparsable
/// response falls back to the original order, truncated to `max_results`.
pub async fn subagent_filter(
    llm: &LlmClient,
    model: &str,
    query: &str,
    candidates: &[Hit],
    max_results: usize,
) -> Vec<Hit> {
    if candidates.len() <= max_results {
        return candidates.to_vec();
    }

    let prompt = build_prompt(query, candidates, max_results);
    let messages = vec![Message { role: "user".to_string(), content: MessageContent::Text(prompt) }];

    let response = match llm.chat(model, &messages, 0.0, 256).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "subagent filter LLM call failed; keeping original order");
            return candidates[..max_results].to_vec();
        }
    };

    let indices = parse_indices(&response, candidates.len());
    if indices.is_empty() {
        return candidates[..max_results].to_vec();
    }

    indices
        .into_iter()
        .take(max_results)
        .map(|i| candidates[i].clone())
        .collect()
}

fn build_prompt(query: &str, candidates: &[Hit], max_results: usize) -> String {
    let mut prompt = format!(
        "Query: {query}\n\nSelect the {max_results} most relevant candidates below. \
         Reply with only a comma-separated list of their indices.\n\n"
    );
    for (i, hit) in candidates.iter().enumerate() {
        let preview: String = hit.text.chars().take(PREVIEW_CHARS).collect();
        prompt.push_str(&format!("[{i}] source={} score={:.3} preview={preview}\n", hit.source, hit.score));
    }
    prompt
}

/// Parses the first occurrence of each integer found in `response`, clamped
/// to `[0, len)`, deduplicated while preserving order.
fn parse_indices(response: &str, len: usize) -> Vec<usize> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for token in response.split(|c: char| !c.is_ascii_digit()) {
        if token.is_empty() {
            continue;
        }
        if let Ok(index) = token.parse::<usize>() {
            if index < len && seen.insert(index) {
                out.push(index);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::parse_indices;

    #[test]
    fn parses_comma_separated_indices() {
        assert_eq!(parse_indices("2, 0, 5", 6), vec![2, 0, 5]);
    }

    #[test]
    fn ignores_out_of_range_and_duplicate_indices() {
        assert_eq!(parse_indices("2, 2, 99, 1", 3), vec![2, 1]);
    }

    #[test]
    fn empty_response_yields_no_indices() {
        assert!(parse_indices("I am not sure.", 3).is_empty());
    }
}
