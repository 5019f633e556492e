//! Token estimation shared by the router and answer orchestrator.
//!
//! Matches the reference behavior exactly: one token per four characters,
//! rounded up.

use serde::{Deserialize, Serialize};

#[must_use]
pub fn estimate_tokens_from_text(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(4)
}

/// Content of a chat-style message: a plain string, or a list of typed parts
/// (only `type == "text"` parts contribute to the estimate).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

#[must_use]
pub fn estimate_tokens_from_messages(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::Text(s) => estimate_tokens_from_text(s),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| p.kind == "text")
                .map(|p| estimate_tokens_from_text(&p.text))
                .sum(),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageContent, MessagePart, estimate_tokens_from_messages, estimate_tokens_from_text};

    #[test]
    fn rounds_up_to_nearest_four_chars() {
        assert_eq!(estimate_tokens_from_text(""), 0);
        assert_eq!(estimate_tokens_from_text("abc"), 1);
        assert_eq!(estimate_tokens_from_text("abcd"), 1);
        assert_eq!(estimate_tokens_from_text("abcde"), 2);
    }

    #[test]
    fn sums_across_string_and_part_messages() {
        let messages = vec![
            Message {
                role: "user".to_string(),
                content: MessageContent::Text("abcdefgh".to_string()),
            },
            Message {
                role: "assistant".to_string(),
                content: MessageContent::Parts(vec![
                    MessagePart {
                        kind: "text".to_string(),
                        text: "abcd".to_string(),
                    },
                    MessagePart {
                        kind: "image".to_string(),
                        text: "ignored-should-not-count".to_string(),
                    },
                ]),
            },
        ];
        assert_eq!(estimate_tokens_from_messages(&messages), 2 + 1);
    }
}
