//! Project registry: named workspaces persisted to a single JSON file,
//! with at most one active project at a time.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root: PathBuf,
    #[serde(default)]
    pub active: bool,
}

impl Project {
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let root = root.into();
        let id = project_id(&name, &root);
        Self {
            id,
            name,
            root,
            active: false,
        }
    }
}

/// 8 hex characters of `SHA-256(name:root)`, stable across process restarts.
#[must_use]
pub fn project_id(name: &str, root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

#[must_use]
pub fn is_valid_project_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Derives a valid project name from an arbitrary directory name by
/// replacing disallowed characters with `_` and truncating to 64 bytes,
/// for the `project="auto"` auto-init path where the name comes from `cwd`.
#[must_use]
pub fn sanitize_project_name(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let trimmed: String = mapped.chars().take(64).collect();
    if trimmed.is_empty() { "project".to_string() } else { trimmed }
}

/// The `projects.json` registry: name → project record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, Project>,
}

impl ProjectRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading project registry: {}", path.display()))?;
        let registry = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing project registry: {}", path.display()))?;
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    #[must_use]
    pub fn active(&self) -> Option<&Project> {
        self.projects.values().find(|p| p.active)
    }

    pub fn upsert(&mut self, project: Project) {
        self.projects.insert(project.name.clone(), project);
    }

    pub fn remove(&mut self, name: &str) -> Option<Project> {
        self.projects.remove(name)
    }

    #[must_use]
    pub fn list(&self) -> Vec<&Project> {
        self.projects.values().collect()
    }

    /// Marks `name` active and every other project inactive. Errors if `name`
    /// is not registered, preserving the at-most-one-active invariant.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.projects.contains_key(name) {
            bail!("unknown project: {name}");
        }
        for (key, project) in &mut self.projects {
            project.active = key == name;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Project, ProjectRegistry, is_valid_project_name, project_id, sanitize_project_name};

    #[test]
    fn sanitizes_disallowed_characters() {
        assert_eq!(sanitize_project_name("my demo.repo"), "my_demo_repo");
        assert_eq!(sanitize_project_name(""), "project");
        assert!(is_valid_project_name(&sanitize_project_name("weird!! name@@")));
    }

    #[test]
    fn project_id_is_stable_and_distinguishes_root() {
        let a = project_id("demo", std::path::Path::new("/tmp/demo"));
        let b = project_id("demo", std::path::Path::new("/tmp/other"));
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
        assert_eq!(a, project_id("demo", std::path::Path::new("/tmp/demo")));
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(is_valid_project_name("demo_1"));
        assert!(!is_valid_project_name(""));
        assert!(!is_valid_project_name("has space"));
        assert!(!is_valid_project_name(&"a".repeat(65)));
    }

    #[test]
    fn at_most_one_active_project() {
        let mut registry = ProjectRegistry::default();
        registry.upsert(Project::new("a", "/tmp/a"));
        registry.upsert(Project::new("b", "/tmp/b"));
        registry.set_active("a").expect("set a active");
        registry.set_active("b").expect("set b active");
        assert_eq!(registry.active().map(|p| p.name.as_str()), Some("b"));
        assert_eq!(registry.list().iter().filter(|p| p.active).count(), 1);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("projects.json");
        let mut registry = ProjectRegistry::default();
        registry.upsert(Project::new("demo", "/tmp/demo"));
        registry.save(&path).expect("save");

        let loaded = ProjectRegistry::load(&path).expect("load");
        assert_eq!(loaded.get("demo").map(|p| p.id.clone()), registry.get("demo").map(|p| p.id.clone()));
    }
}
