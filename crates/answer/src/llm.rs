//! LLM chat-completion client used by C7/C8/C9/C13: an OpenAI-compatible
//! `/chat/completions` caller with bounded retries and jittered exponential
//! backoff, mirroring the shape of `embeddings::remote::RemoteEmbeddingClient`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use common::config::RetryConfig;
use common::tokens::Message;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub retry: RetryConfig,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LLM_API_BASE_URL").ok(),
            api_key: std::env::var("LLM_API_KEY").ok(),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

enum ChatAttemptError {
    Retryable(String),
    Fatal(anyhow::Error),
}

impl LlmClient {
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Sends a chat completion request, retrying retryable failures
    /// (connection errors, timeouts, HTTP 429/500/502/503/504) with
    /// exponential backoff plus +/-25% jitter, per `SPEC_FULL.md` section 5.
    pub async fn chat(&self, model: &str, messages: &[Message], temperature: f32, max_tokens: usize) -> Result<String> {
        if !self.is_configured() {
            bail!("UPSTREAM_FAILURE: LLM backend is not configured");
        }

        let mut attempt: u32 = 0;
        loop {
            match self.try_chat(model, messages, temperature, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(ChatAttemptError::Fatal(err)) => return Err(err),
                Err(ChatAttemptError::Retryable(reason)) => {
                    attempt += 1;
                    if attempt > self.config.retry.max_retries {
                        bail!("UPSTREAM_FAILURE: LLM call failed after {} retries: {reason}", self.config.retry.max_retries);
                    }
                    tokio::time::sleep(backoff_delay(&self.config.retry, attempt)).await;
                }
            }
        }
    }

    async fn try_chat(
        &self,
        model: &str,
        messages: &[Message],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ChatAttemptError> {
        let (Some(base_url), Some(api_key)) = (&self.config.base_url, &self.config.api_key) else {
            return Err(ChatAttemptError::Fatal(anyhow::anyhow!("UPSTREAM_FAILURE: LLM backend is not configured")));
        };

        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&ChatRequest { model, messages, temperature, max_tokens })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() || err.is_connect() => {
                return Err(ChatAttemptError::Retryable(err.to_string()));
            }
            Err(err) => return Err(ChatAttemptError::Fatal(anyhow::Error::new(err).context("UPSTREAM_FAILURE: LLM request failed"))),
        };

        let status = response.status();
        if is_retryable_status(status.as_u16()) {
            return Err(ChatAttemptError::Retryable(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(ChatAttemptError::Fatal(anyhow::anyhow!("UPSTREAM_FAILURE: LLM API returned status {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("UPSTREAM_FAILURE: failed decoding LLM response")
            .map_err(ChatAttemptError::Fatal)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatAttemptError::Fatal(anyhow::anyhow!("UPSTREAM_FAILURE: LLM response had no choices")))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let shift = attempt.min(20).saturating_sub(1);
    let exp = retry.base_delay_ms.saturating_mul(1u64 << shift);
    let capped = exp.min(retry.max_delay_ms).max(retry.base_delay_ms);
    let jitter_fraction = rand::rng().random_range(-0.25..=0.25);
    let jittered = (capped as f64) * (1.0 + jitter_fraction);
    Duration::from_millis(jittered.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use common::config::RetryConfig;

    use super::{LlmConfig, backoff_delay};

    #[test]
    fn unconfigured_client_reports_not_configured() {
        let config = LlmConfig { base_url: None, api_key: None, retry: RetryConfig::default() };
        assert!(!config.is_configured());
    }

    #[test]
    fn backoff_delay_stays_within_jittered_bounds() {
        let retry = RetryConfig { max_retries: 3, base_delay_ms: 1000, max_delay_ms: 60_000 };
        for attempt in 1..=5 {
            let delay = backoff_delay(&retry, attempt);
            assert!(delay.as_millis() <= (retry.max_delay_ms as f64 * 1.25) as u128);
        }
    }
}
