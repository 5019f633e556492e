use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application-wide configuration: an optional TOML file layered with
/// environment variable overrides, following the same load order on every
/// field (file value, then env override if set).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub default_top_k: usize,
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub debug: bool,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            default_top_k: 8,
            bm25_weight: 0.5,
            vector_weight: 0.5,
            debug: false,
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var("AUGMENT_DB_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(top_k) = std::env::var("CODEVIX_DEFAULT_TOP_K") {
            cfg.default_top_k = top_k.parse().unwrap_or(cfg.default_top_k);
        }
        if let Ok(debug) = std::env::var("AUGMENT_DEBUG") {
            cfg.debug = debug.eq_ignore_ascii_case("true") || debug == "1";
        }
        if let Ok(w) = std::env::var("CODEVIX_BM25_WEIGHT") {
            if let Ok(v) = w.parse() {
                cfg.bm25_weight = v;
            }
        }
        if let Ok(w) = std::env::var("CODEVIX_VECTOR_WEIGHT") {
            if let Ok(v) = w.parse() {
                cfg.vector_weight = v;
            }
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::AppConfig;

    #[test]
    fn loads_default_when_file_missing() {
        let cfg = AppConfig::load(PathBuf::from("does-not-exist.toml").as_path()).expect("config");
        assert_eq!(cfg.default_top_k, 8);
        assert!((cfg.bm25_weight - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn loads_toml_file() {
        let mut path = std::env::temp_dir();
        path.push("augment-lite-config-test.toml");
        fs::write(
            &path,
            "data_dir='/tmp/augment-data'\ndefault_top_k=12\nbm25_weight=0.6\nvector_weight=0.4\ndebug=false\n\n[retry]\nmax_retries=3\nbase_delay_ms=1000\nmax_delay_ms=60000\n",
        )
        .expect("write");

        let cfg = AppConfig::load(path.as_path()).expect("config");
        assert_eq!(cfg.default_top_k, 12);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/augment-data"));
    }
}
