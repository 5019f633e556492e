//! Local project index manager: a thin CLI over the same project registry
//! and incremental indexer the stdio server uses, for driving indexing from
//! scripts or a shell without going through JSON-RPC.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use common::{AppConfig, Project, ProjectRegistry};
use embeddings::{EmbeddingConfig, EmbeddingProvider};
use indexer::{ProjectStore, StorePaths};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "codivex-mcp")]
#[command(about = "Local project index manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a project root and make it the active project.
    AddRepo {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Drop a project from the registry.
    RemoveRepo { name: String },
    /// List every registered project.
    ListRepos,
    /// Re-scan and re-index a project (defaults to the active project).
    IndexNow { name: Option<String> },
    /// Print the active project and every registered project.
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let config = AppConfig::load(&cwd.join("mcp-server.toml"))?;
    std::fs::create_dir_all(&config.data_dir)?;
    let registry_path = config.data_dir.join("projects.json");

    match cli.command {
        Commands::AddRepo { path, name } => add_repo(&registry_path, &path, name.as_deref()),
        Commands::RemoveRepo { name } => remove_repo(&registry_path, &name),
        Commands::ListRepos => list_repos(&registry_path),
        Commands::IndexNow { name } => index_now(&config, &registry_path, name.as_deref()),
        Commands::Status => status(&config, &registry_path),
    }
}

fn canonical_repo_path(path: &Path) -> anyhow::Result<PathBuf> {
    let canonical = std::fs::canonicalize(path)
        .with_context(|| format!("repo path does not exist or is not accessible: {}", path.display()))?;
    if !canonical.is_dir() {
        bail!("repo path is not a directory: {}", canonical.display());
    }
    Ok(canonical)
}

fn add_repo(registry_path: &Path, path: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let root = canonical_repo_path(path)?;
    let name = name
        .map(str::to_string)
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().to_string()))
        .context("could not derive a project name from the path")?;
    if !common::project::is_valid_project_name(&name) {
        bail!("invalid project name: {name}");
    }

    let mut registry = ProjectRegistry::load(registry_path)?;
    let project = registry.get(&name).cloned().unwrap_or_else(|| Project::new(&name, root.clone()));
    registry.upsert(project);
    registry.set_active(&name)?;
    registry.save(registry_path)?;
    println!("added repo: {name} ({})", root.display());
    Ok(())
}

fn remove_repo(registry_path: &Path, name: &str) -> anyhow::Result<()> {
    let mut registry = ProjectRegistry::load(registry_path)?;
    if registry.remove(name).is_none() {
        bail!("no such project: {name}");
    }
    registry.save(registry_path)?;
    println!("removed repo: {name}");
    Ok(())
}

fn list_repos(registry_path: &Path) -> anyhow::Result<()> {
    let registry = ProjectRegistry::load(registry_path)?;
    for project in registry.list() {
        println!("{}{} ({})", if project.active { "* " } else { "  " }, project.name, project.root.display());
    }
    Ok(())
}

fn resolve_project(registry_path: &Path, name: Option<&str>) -> anyhow::Result<Project> {
    let registry = ProjectRegistry::load(registry_path)?;
    match name {
        Some(name) => registry.get(name).cloned().with_context(|| format!("unknown project: {name}")),
        None => registry.active().cloned().context("no active project; run add-repo first"),
    }
}

fn index_now(config: &AppConfig, registry_path: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let project = resolve_project(registry_path, name)?;
    let paths = StorePaths::for_project(&config.data_dir, &project.name);
    let embeddings = Arc::new(EmbeddingProvider::new(EmbeddingConfig::default()));
    let mut store = ProjectStore::open(project.root.clone(), paths, embeddings)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let stats = runtime.block_on(store.auto_index_if_needed())?;
    match stats {
        Some(stats) => println!(
            "indexed {}: chunks_added={} chunks_removed={} chunks_total={}",
            project.name, stats.chunks_added, stats.chunks_removed, stats.chunks_total
        ),
        None => println!("{}: no changes since last index", project.name),
    }
    Ok(())
}

fn status(config: &AppConfig, registry_path: &Path) -> anyhow::Result<()> {
    let registry = ProjectRegistry::load(registry_path)?;
    let active = registry.active().cloned();
    let projects: Vec<&Project> = registry.list();

    let index_summary = active.as_ref().and_then(|project| {
        let paths = StorePaths::for_project(&config.data_dir, &project.name);
        let embeddings = Arc::new(EmbeddingProvider::new(EmbeddingConfig::default()));
        let store = ProjectStore::open(project.root.clone(), paths, embeddings).ok()?;
        Some(serde_json::json!({"chunk_count": store.chunk_count(), "has_vector_index": store.has_vector_index()}))
    });

    let output = serde_json::json!({
        "active_project": active.as_ref().map(|p| &p.name),
        "registered_projects": projects.len(),
        "projects": projects,
        "active_index": index_summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
