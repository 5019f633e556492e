//! Process-wide server state: project registry, per-project retrieval
//! stores, the response cache, the model router, and the LLM client.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use answer::{LlmClient, LlmConfig};
use cache::CacheStore;
use common::{AppConfig, Project, ProjectRegistry};
use embeddings::EmbeddingProvider;
use indexer::{ProjectStore, StorePaths};
use router::RouterConfig;
use tokio::sync::Mutex;

use crate::memory_store::MemoryStore;
use crate::task_store::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub cwd: PathBuf,
    pub config: AppConfig,
    registry_path: PathBuf,
    registry: Arc<Mutex<ProjectRegistry>>,
    stores: Arc<Mutex<HashMap<String, Arc<Mutex<ProjectStore>>>>>,
    pub embeddings: Arc<EmbeddingProvider>,
    pub cache: Arc<CacheStore>,
    pub router_config: Arc<RouterConfig>,
    pub llm: Arc<LlmClient>,
    pub memory: Arc<MemoryStore>,
    pub tasks: Arc<TaskStore>,
}

impl AppState {
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let config = AppConfig::load(&cwd.join("mcp-server.toml"))?;
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed creating data dir: {}", config.data_dir.display()))?;

        let registry_path = config.data_dir.join("projects.json");
        let registry = ProjectRegistry::load(&registry_path)?;

        let embeddings = Arc::new(EmbeddingProvider::new(embeddings::EmbeddingConfig::default()));
        let cache = Arc::new(CacheStore::open(&config.data_dir)?);
        let llm = Arc::new(LlmClient::new(LlmConfig::from_env()));
        let memory = Arc::new(MemoryStore::open(&config.data_dir.join("longterm.sqlite"))?);
        let tasks = Arc::new(TaskStore::open(&config.data_dir.join("tasks.sqlite"))?);

        Ok(Self {
            cwd,
            config,
            registry_path,
            registry: Arc::new(Mutex::new(registry)),
            stores: Arc::new(Mutex::new(HashMap::new())),
            embeddings,
            cache,
            router_config: Arc::new(RouterConfig::default()),
            llm,
            memory,
            tasks,
        })
    }

    #[cfg(test)]
    pub fn for_tests(data_dir: &std::path::Path) -> Result<Self> {
        let config = AppConfig { data_dir: data_dir.to_path_buf(), ..AppConfig::default() };
        std::fs::create_dir_all(&config.data_dir)?;
        let registry_path = config.data_dir.join("projects.json");
        let registry = ProjectRegistry::load(&registry_path)?;
        Ok(Self {
            cwd: data_dir.to_path_buf(),
            registry_path,
            registry: Arc::new(Mutex::new(registry)),
            stores: Arc::new(Mutex::new(HashMap::new())),
            embeddings: Arc::new(EmbeddingProvider::new(embeddings::EmbeddingConfig {
                vector_dim: 8,
                local: embeddings::LocalBackendConfig { allow_pseudo_fallback: true, ..Default::default() },
                ..Default::default()
            })),
            cache: Arc::new(CacheStore::open(&config.data_dir)?),
            llm: Arc::new(LlmClient::new(LlmConfig::default())),
            memory: Arc::new(MemoryStore::open(&config.data_dir.join("longterm.sqlite"))?),
            tasks: Arc::new(TaskStore::open(&config.data_dir.join("tasks.sqlite"))?),
            router_config: Arc::new(RouterConfig::default()),
            config,
        })
    }

    /// Resolves a project name, treating `"auto"` / empty as "the active
    /// project". When no project is active yet, auto-initializes one from
    /// `cwd` (per `SPEC_FULL.md`'s auto-init-on-first-search scenario)
    /// instead of erroring.
    pub async fn resolve_project(&self, requested: &str) -> Result<Project> {
        if requested.is_empty() || requested == "auto" {
            let existing = {
                let registry = self.registry.lock().await;
                registry.active().cloned()
            };
            if let Some(active) = existing {
                return Ok(active);
            }
            return self.auto_init_from_cwd().await;
        }
        let registry = self.registry.lock().await;
        registry.get(requested).cloned().with_context(|| format!("NOT_FOUND: unknown project: {requested}"))
    }

    async fn auto_init_from_cwd(&self) -> Result<Project> {
        let raw = self.cwd.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "project".to_string());
        let name = common::project::sanitize_project_name(&raw);
        self.init_project(&name, self.cwd.clone()).await
    }

    /// Registers (or re-activates) a project by name and root path,
    /// per `SPEC_FULL.md`'s at-most-one-active-project invariant.
    pub async fn init_project(&self, name: &str, root: PathBuf) -> Result<Project> {
        if !common::project::is_valid_project_name(name) {
            bail!("INVALID_INPUT: invalid project name: {name}");
        }
        let mut registry = self.registry.lock().await;
        let project = registry.get(name).cloned().unwrap_or_else(|| Project::new(name, root));
        registry.upsert(project.clone());
        registry.set_active(name)?;
        registry.save(&self.registry_path)?;
        Ok(registry.get(name).cloned().expect("just upserted"))
    }

    pub async fn list_projects(&self) -> Vec<Project> {
        self.registry.lock().await.list().into_iter().cloned().collect()
    }

    /// Returns the shared, lazily-opened store for `project`.
    pub async fn store_for(&self, project: &Project) -> Result<Arc<Mutex<ProjectStore>>> {
        let mut guard = self.stores.lock().await;
        if let Some(existing) = guard.get(&project.name) {
            return Ok(existing.clone());
        }
        let paths = StorePaths::for_project(&self.config.data_dir, &project.name);
        let store = ProjectStore::open(project.root.clone(), paths, self.embeddings.clone())?;
        let shared = Arc::new(Mutex::new(store));
        guard.insert(project.name.clone(), shared.clone());
        Ok(shared)
    }

    /// Drops a project's in-memory store handle, forcing the next access to
    /// reopen from disk (used after `index.rebuild`'s `vector_only` swap).
    pub async fn evict_store(&self, project_name: &str) {
        self.stores.lock().await.remove(project_name);
    }
}
