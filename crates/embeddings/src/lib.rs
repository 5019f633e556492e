pub mod config;
pub mod local;
pub mod remote;

pub use config::{EmbeddingConfig, ExecutionDevice, LocalBackendConfig, RemoteBackendConfig};
pub use local::LocalEmbeddingEngine;
pub use remote::RemoteEmbeddingClient;

use anyhow::Result;

/// Embedding provider (C2): batches text through the remote API when
/// configured, falling back to the local ONNX engine per-batch on failure.
/// Every returned vector is L2-normalized so downstream cosine similarity
/// reduces to inner product.
pub struct EmbeddingProvider {
    config: EmbeddingConfig,
    remote: RemoteEmbeddingClient,
    local: LocalEmbeddingEngine,
}

impl EmbeddingProvider {
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        let remote = RemoteEmbeddingClient::new(config.remote.clone());
        let local = LocalEmbeddingEngine::new(config.local.clone());
        Self { config, remote, local }
    }

    #[must_use]
    pub fn vector_dim(&self) -> usize {
        self.config.vector_dim
    }

    /// Encodes `texts` into L2-normalized vectors, batching at the remote
    /// client's configured batch size (default 10). Each batch independently
    /// tries the remote API first, falling back to the local engine on
    /// failure, so a transient remote outage degrades one batch at a time.
    /// A dimension mismatch is advisory here: it is logged and the
    /// mis-sized vectors are still returned, so a runtime search degrades
    /// to BM25-only rather than failing outright (`SPEC_FULL.md` section 7).
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode_with(texts, false).await
    }

    /// Like `encode`, but a dimension mismatch on any batch is fatal. Used
    /// by `build_index`/incremental-rebuild callers so a misconfigured
    /// embedding dimension is caught before it corrupts a freshly written
    /// vector index (`SPEC_FULL.md` section 4.2 and 4.4).
    pub async fn encode_strict(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode_with(texts, true).await
    }

    async fn encode_with(&self, texts: &[String], strict: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = self.config.remote.batch_size.max(1);
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let vectors = self.encode_batch(batch, strict).await?;
            out.extend(vectors);
        }
        Ok(out)
    }

    async fn encode_batch(&self, batch: &[String], strict: bool) -> Result<Vec<Vec<f32>>> {
        let raw = if self.remote.is_configured() {
            match self.remote.embed_batch(batch).await {
                Ok(vectors) => vectors,
                Err(err) => {
                    tracing::warn!(error = %err, "remote embedding batch failed, falling back to local backend");
                    self.local.embed_batch(batch, self.config.vector_dim)?
                }
            }
        } else {
            self.local.embed_batch(batch, self.config.vector_dim)?
        };

        for vector in &raw {
            if vector.len() != self.config.vector_dim {
                if strict {
                    anyhow::bail!(
                        "INDEX_UNAVAILABLE: embedding dimension mismatch: provider returned {} but vector_dim is configured as {}; update the vector_dim config key to match the embedding model before rebuilding",
                        vector.len(),
                        self.config.vector_dim,
                    );
                }
                tracing::warn!(
                    expected = self.config.vector_dim,
                    actual = vector.len(),
                    "embedding batch returned an unexpected dimension"
                );
            }
        }

        Ok(raw.into_iter().map(|v| l2_normalize(&v)).collect())
    }
}

#[must_use]
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::{EmbeddingConfig, EmbeddingProvider, l2_normalize};
    use crate::config::LocalBackendConfig;

    #[test]
    fn l2_normalize_produces_unit_vectors() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        let norm = normalized.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector_alone() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn encode_falls_back_to_local_pseudo_backend_without_remote_config() {
        let provider = EmbeddingProvider::new(EmbeddingConfig {
            vector_dim: 8,
            local: LocalBackendConfig { allow_pseudo_fallback: true, ..LocalBackendConfig::default() },
            ..EmbeddingConfig::default()
        });
        let vectors = provider.encode(&["hello".to_string(), "world".to_string()]).await.expect("vectors");
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 8);
    }
}
