#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionDevice {
    Cpu,
    GpuPreferred,
}

impl ExecutionDevice {
    pub fn from_env() -> Self {
        let raw = std::env::var("EMBEDDING_DEVICE").unwrap_or_default();
        if raw.eq_ignore_ascii_case("gpu") {
            Self::GpuPreferred
        } else {
            Self::Cpu
        }
    }
}

/// Local ONNX fallback backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBackendConfig {
    pub model_path: String,
    pub tokenizer_path: Option<String>,
    pub max_sequence_length: usize,
    pub execution_device: ExecutionDevice,
    pub allow_pseudo_fallback: bool,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        let model_path = std::env::var("EMBEDDING_LOCAL_MODEL_PATH")
            .unwrap_or_else(|_| "models/all-minilm-l6-v2.onnx".to_string());
        let tokenizer_path = std::env::var("EMBEDDING_LOCAL_TOKENIZER_PATH").ok().or_else(|| {
            let candidate = std::path::Path::new(&model_path).with_extension("tokenizer.json");
            if candidate.exists() {
                Some(candidate.display().to_string())
            } else {
                None
            }
        });
        Self {
            model_path,
            tokenizer_path,
            max_sequence_length: 256,
            execution_device: ExecutionDevice::from_env(),
            allow_pseudo_fallback: std::env::var("EMBEDDING_ALLOW_PSEUDO")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(cfg!(test)),
        }
    }
}

/// Remote API backend settings: the preferred backend when credentials are
/// present (`SPEC_FULL.md` section 4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBackendConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub batch_size: usize,
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("EMBEDDING_API_BASE_URL").ok(),
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            model: std::env::var("EMBEDDING_API_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            batch_size: std::env::var("EMBEDDING_API_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl RemoteBackendConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub vector_dim: usize,
    pub remote: RemoteBackendConfig,
    pub local: LocalBackendConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            remote: RemoteBackendConfig::default(),
            local: LocalBackendConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EmbeddingConfig, RemoteBackendConfig};

    #[test]
    fn remote_backend_requires_both_url_and_key() {
        let mut remote = RemoteBackendConfig {
            base_url: None,
            api_key: None,
            model: "m".into(),
            batch_size: 10,
        };
        assert!(!remote.is_configured());
        remote.base_url = Some("https://example.test".into());
        assert!(!remote.is_configured());
        remote.api_key = Some("key".into());
        assert!(remote.is_configured());
    }

    #[test]
    fn default_vector_dim_matches_baseline_model() {
        assert_eq!(EmbeddingConfig::default().vector_dim, 384);
    }
}
