//! Long-term key/value memory, scoped per project (or global when
//! `project` is `None`), backed by a SQLite table `mem(project, k, v,
//! created_at, updated_at)` keyed on `(project, k)`.

use std::path::Path;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

const GLOBAL_SCOPE: &str = "";

pub struct MemoryStore {
    conn: std::sync::Mutex<Connection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

impl MemoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS mem (
                project TEXT NOT NULL,
                k TEXT NOT NULL,
                v TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (project, k)
            )",
            [],
        )?;
        Ok(Self { conn: std::sync::Mutex::new(conn) })
    }

    fn scope(project: Option<&str>) -> &str {
        project.unwrap_or(GLOBAL_SCOPE)
    }

    pub fn set(&self, project: Option<&str>, key: &str, value: &str) -> Result<()> {
        let scope = Self::scope(project);
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        conn.execute(
            "INSERT INTO mem (project, k, v, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(project, k) DO UPDATE SET v = excluded.v, updated_at = excluded.updated_at",
            params![scope, key, value, now],
        )?;
        Ok(())
    }

    pub fn get(&self, project: Option<&str>, key: &str) -> Result<Option<String>> {
        let scope = Self::scope(project);
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let value = conn
            .query_row("SELECT v FROM mem WHERE project = ?1 AND k = ?2", params![scope, key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn list(&self, project: Option<&str>) -> Result<Vec<MemoryEntry>> {
        let scope = Self::scope(project);
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let mut stmt = conn.prepare("SELECT k, v, updated_at FROM mem WHERE project = ?1 ORDER BY k ASC")?;
        let rows = stmt
            .query_map(params![scope], |row| {
                Ok(MemoryEntry { key: row.get(0)?, value: row.get(1)?, updated_at: row.get(2)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete(&self, project: Option<&str>, key: &str) -> Result<bool> {
        let scope = Self::scope(project);
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let changed = conn.execute("DELETE FROM mem WHERE project = ?1 AND k = ?2", params![scope, key])?;
        Ok(changed > 0)
    }

    pub fn clear(&self, project: Option<&str>) -> Result<usize> {
        let scope = Self::scope(project);
        let conn = self.conn.lock().expect("memory store mutex poisoned");
        let changed = conn.execute("DELETE FROM mem WHERE project = ?1", params![scope])?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::open(&std::env::temp_dir().join(format!("mem-test-{}.sqlite", std::process::id()))).expect("open")
    }

    #[test]
    fn round_trips_a_value() {
        let store = store();
        store.set(Some("p1"), "greeting", "hello").expect("set");
        assert_eq!(store.get(Some("p1"), "greeting").expect("get"), Some("hello".to_string()));
    }

    #[test]
    fn projects_are_isolated() {
        let store = store();
        store.set(Some("p1"), "k", "a").expect("set p1");
        store.set(Some("p2"), "k", "b").expect("set p2");
        assert_eq!(store.get(Some("p1"), "k").expect("get").as_deref(), Some("a"));
        assert_eq!(store.get(Some("p2"), "k").expect("get").as_deref(), Some("b"));
        store.clear(Some("p1")).expect("clear p1");
        assert_eq!(store.get(Some("p1"), "k").expect("get"), None);
        assert_eq!(store.get(Some("p2"), "k").expect("get").as_deref(), Some("b"));
    }

    #[test]
    fn global_scope_is_distinct_from_named_projects() {
        let store = store();
        store.set(None, "k", "global").expect("set global");
        store.set(Some("p1"), "k", "scoped").expect("set scoped");
        assert_eq!(store.get(None, "k").expect("get").as_deref(), Some("global"));
        assert_eq!(store.get(Some("p1"), "k").expect("get").as_deref(), Some("scoped"));
    }
}
