//! Remote embedding API client: the preferred backend when credentials are
//! configured. Speaks an OpenAI-compatible `/embeddings` endpoint.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::config::RemoteBackendConfig;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

pub struct RemoteEmbeddingClient {
    client: reqwest::Client,
    config: RemoteBackendConfig,
}

impl RemoteEmbeddingClient {
    #[must_use]
    pub fn new(config: RemoteBackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Embeds one batch. Callers are responsible for chunking the full input
    /// list into `config.batch_size`-sized batches.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let (Some(base_url), Some(api_key)) = (&self.config.base_url, &self.config.api_key) else {
            bail!("remote embedding backend is not configured");
        };
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&EmbeddingsRequest { model: &self.config.model, input: inputs })
            .send()
            .await
            .context("remote embedding request failed")?;

        if !response.status().is_success() {
            bail!("remote embedding API returned status {}", response.status());
        }

        let mut parsed: EmbeddingsResponse =
            response.json().await.context("failed decoding remote embedding response")?;
        parsed.data.sort_by_key(|d| d.index);
        if parsed.data.len() != inputs.len() {
            bail!(
                "remote embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            );
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteBackendConfig, RemoteEmbeddingClient};

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let client = RemoteEmbeddingClient::new(RemoteBackendConfig {
            base_url: None,
            api_key: None,
            model: "m".into(),
            batch_size: 10,
        });
        assert!(!client.is_configured());
        let err = client.embed_batch(&["hello".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
