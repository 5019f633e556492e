//! Exact-match response cache (C10): a `(project, key) -> value` table with
//! a TTL, backed by an embedded SQLite database.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

pub struct ExactCache {
    conn: Connection,
}

impl ExactCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening exact cache database: {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                project TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                expire_at INTEGER NOT NULL,
                PRIMARY KEY (project, key)
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                project TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                expire_at INTEGER NOT NULL,
                PRIMARY KEY (project, key)
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Returns the cached value if present and unexpired. An expired row is
    /// deleted before returning `None`, per `SPEC_FULL.md` section 4.10.
    pub fn get(&self, project: &str, key: &str) -> Result<Option<String>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT value, expire_at FROM cache WHERE project = ?1 AND key = ?2",
                params![project, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, expire_at)) = row else {
            return Ok(None);
        };
        if expire_at < now_secs() {
            self.conn.execute(
                "DELETE FROM cache WHERE project = ?1 AND key = ?2",
                params![project, key],
            )?;
            return Ok(None);
        }
        Ok(Some(value))
    }

    pub fn set(&self, project: &str, key: &str, value: &str, ttl_secs: i64) -> Result<()> {
        let expire_at = now_secs() + ttl_secs;
        self.conn.execute(
            "INSERT INTO cache (project, key, value, expire_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project, key) DO UPDATE SET value = excluded.value, expire_at = excluded.expire_at",
            params![project, key, value, expire_at],
        )?;
        Ok(())
    }

    /// Counts unexpired rows for `project`, without purging expired ones.
    pub fn count(&self, project: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cache WHERE project = ?1 AND expire_at >= ?2",
            params![project, now_secs()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Deletes every row for `project`, or every row if `project == "all"`.
    pub fn clear(&self, project: &str) -> Result<usize> {
        let affected = if project == "all" {
            self.conn.execute("DELETE FROM cache", [])?
        } else {
            self.conn.execute("DELETE FROM cache WHERE project = ?1", params![project])?
        };
        Ok(affected)
    }
}

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::ExactCache;

    #[test]
    fn set_then_get_round_trips() {
        let cache = ExactCache::open_in_memory().expect("cache");
        cache.set("demo", "k1", "v1", 60).expect("set");
        assert_eq!(cache.get("demo", "k1").expect("get"), Some("v1".to_string()));
    }

    #[test]
    fn expired_entries_are_deleted_on_read() {
        let cache = ExactCache::open_in_memory().expect("cache");
        cache.set("demo", "k1", "v1", -1).expect("set expired");
        assert_eq!(cache.get("demo", "k1").expect("get"), None);
    }

    #[test]
    fn clear_project_only_affects_that_project() {
        let cache = ExactCache::open_in_memory().expect("cache");
        cache.set("a", "k", "v", 60).expect("set a");
        cache.set("b", "k", "v", 60).expect("set b");
        cache.clear("a").expect("clear a");
        assert_eq!(cache.get("a", "k").expect("get a"), None);
        assert_eq!(cache.get("b", "k").expect("get b"), Some("v".to_string()));
    }

    #[test]
    fn count_reports_only_unexpired_rows_for_the_project() {
        let cache = ExactCache::open_in_memory().expect("cache");
        cache.set("demo", "live", "v1", 60).expect("set live");
        cache.set("demo", "dead", "v2", -1).expect("set expired");
        cache.set("other", "k", "v3", 60).expect("set other");
        assert_eq!(cache.count("demo").expect("count"), 1);
    }

    #[test]
    fn clear_all_removes_every_partition() {
        let cache = ExactCache::open_in_memory().expect("cache");
        cache.set("a", "k", "v", 60).expect("set a");
        cache.set("b", "k", "v", 60).expect("set b");
        cache.clear("all").expect("clear all");
        assert_eq!(cache.get("a", "k").expect("get a"), None);
        assert_eq!(cache.get("b", "k").expect("get b"), None);
    }
}
