//! Task tracking store: a SQLite-backed `tasks` table supporting the
//! add/get/list/update/delete operations and status lifecycle used by the
//! `task.*` tool group.

use std::path::Path;

use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

pub const VALID_STATUSES: [&str; 4] = ["pending", "in_progress", "done", "cancelled"];

pub struct TaskStore {
    conn: std::sync::Mutex<Connection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub project: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: i64,
    pub parent_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub done: i64,
    pub cancelled: i64,
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        parent_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        completed_at: row.get(9)?,
        metadata: row.get(10)?,
    })
}

const TASK_COLUMNS: &str = "id, project, title, description, status, priority, parent_id, created_at, updated_at, completed_at, metadata";

impl TaskStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                priority INTEGER NOT NULL DEFAULT 0,
                parent_id INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                completed_at INTEGER,
                metadata TEXT
            )",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_tasks_project_status ON tasks (project, status)", [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_tasks_parent_id ON tasks (parent_id)", [])?;
        Ok(Self { conn: std::sync::Mutex::new(conn) })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        project: &str,
        title: &str,
        description: Option<&str>,
        priority: i64,
        parent_id: Option<i64>,
        metadata: Option<&str>,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().expect("task store mutex poisoned");
        conn.execute(
            "INSERT INTO tasks (project, title, description, status, priority, parent_id, created_at, updated_at, metadata)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?6, ?7)",
            params![project, title, description, priority, parent_id, now, metadata],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(&self, project: &str, id: i64) -> Result<Option<Task>> {
        let conn = self.conn.lock().expect("task store mutex poisoned");
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project = ?1 AND id = ?2"),
                params![project, id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list(&self, project: &str, status: Option<&str>, parent_id: Option<i64>) -> Result<Vec<Task>> {
        let conn = self.conn.lock().expect("task store mutex poisoned");
        let sql_base = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project = ?1");
        let tasks = match (status, parent_id) {
            (Some(status), Some(parent_id)) => {
                let mut stmt = conn.prepare(&format!("{sql_base} AND status = ?2 AND parent_id = ?3 ORDER BY priority DESC, created_at ASC"))?;
                stmt.query_map(params![project, status, parent_id], row_to_task)?.collect::<rusqlite::Result<Vec<_>>>()?
            }
            (Some(status), None) => {
                let mut stmt = conn.prepare(&format!("{sql_base} AND status = ?2 ORDER BY priority DESC, created_at ASC"))?;
                stmt.query_map(params![project, status], row_to_task)?.collect::<rusqlite::Result<Vec<_>>>()?
            }
            (None, Some(parent_id)) => {
                let mut stmt = conn.prepare(&format!("{sql_base} AND parent_id = ?2 ORDER BY priority DESC, created_at ASC"))?;
                stmt.query_map(params![project, parent_id], row_to_task)?.collect::<rusqlite::Result<Vec<_>>>()?
            }
            (None, None) => {
                let mut stmt = conn.prepare(&format!("{sql_base} ORDER BY priority DESC, created_at ASC"))?;
                stmt.query_map(params![project], row_to_task)?.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(tasks)
    }

    /// Highest-priority task currently `in_progress`, if any.
    pub fn current(&self, project: &str) -> Result<Option<Task>> {
        let conn = self.conn.lock().expect("task store mutex poisoned");
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project = ?1 AND status = 'in_progress' ORDER BY priority DESC, created_at ASC LIMIT 1"),
                params![project],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        project: &str,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        status: Option<&str>,
        priority: Option<i64>,
        metadata: Option<&str>,
    ) -> Result<bool> {
        if let Some(status) = status {
            if !VALID_STATUSES.contains(&status) {
                bail!("INVALID_INPUT: invalid task status: {status}");
            }
        }

        let conn = self.conn.lock().expect("task store mutex poisoned");
        let Some(existing) = conn
            .query_row(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project = ?1 AND id = ?2"), params![project, id], row_to_task)
            .optional()?
        else {
            return Ok(false);
        };

        let now = chrono::Utc::now().timestamp();
        let new_title = title.unwrap_or(&existing.title);
        let new_description = description.or(existing.description.as_deref());
        let new_status = status.unwrap_or(&existing.status);
        let new_priority = priority.unwrap_or(existing.priority);
        let new_metadata = metadata.or(existing.metadata.as_deref());
        let completed_at = if new_status == "done" { Some(now) } else { existing.completed_at };

        conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, priority = ?4, metadata = ?5, updated_at = ?6, completed_at = ?7
             WHERE project = ?8 AND id = ?9",
            params![new_title, new_description, new_status, new_priority, new_metadata, now, completed_at, project, id],
        )?;
        Ok(true)
    }

    /// Deletes a task, recursively deleting subtasks when `delete_subtasks` is set.
    pub fn delete(&self, project: &str, id: i64, delete_subtasks: bool) -> Result<bool> {
        let conn = self.conn.lock().expect("task store mutex poisoned");
        if delete_subtasks {
            delete_subtasks_recursive(&conn, project, id)?;
        }
        let changed = conn.execute("DELETE FROM tasks WHERE project = ?1 AND id = ?2", params![project, id])?;
        Ok(changed > 0)
    }

    pub fn stats(&self, project: &str) -> Result<TaskStats> {
        let conn = self.conn.lock().expect("task store mutex poisoned");
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks WHERE project = ?1 GROUP BY status")?;
        let rows = stmt.query_map(params![project], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut stats = TaskStats::default();
        for row in rows {
            let (status, count) = row?;
            stats.total += count;
            match status.as_str() {
                "pending" => stats.pending = count,
                "in_progress" => stats.in_progress = count,
                "done" => stats.done = count,
                "cancelled" => stats.cancelled = count,
                _ => {}
            }
        }
        Ok(stats)
    }
}

fn delete_subtasks_recursive(conn: &Connection, project: &str, parent_id: i64) -> Result<()> {
    let mut stmt = conn.prepare("SELECT id FROM tasks WHERE project = ?1 AND parent_id = ?2")?;
    let child_ids: Vec<i64> = stmt.query_map(params![project, parent_id], |row| row.get(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);
    for child_id in child_ids {
        delete_subtasks_recursive(conn, project, child_id)?;
        conn.execute("DELETE FROM tasks WHERE project = ?1 AND id = ?2", params![project, child_id])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::TaskStore;

    fn store() -> TaskStore {
        TaskStore::open(&std::env::temp_dir().join(format!("tasks-test-{}.sqlite", std::process::id()))).expect("open")
    }

    #[test]
    fn adds_and_fetches_a_task() {
        let store = store();
        let id = store.add("p1", "write docs", None, 0, None, None).expect("add");
        let task = store.get("p1", id).expect("get").expect("present");
        assert_eq!(task.title, "write docs");
        assert_eq!(task.status, "pending");
    }

    #[test]
    fn update_to_done_sets_completed_at() {
        let store = store();
        let id = store.add("p1", "ship it", None, 0, None, None).expect("add");
        store.update("p1", id, None, None, Some("done"), None, None).expect("update");
        let task = store.get("p1", id).expect("get").expect("present");
        assert_eq!(task.status, "done");
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn rejects_invalid_status() {
        let store = store();
        let id = store.add("p1", "task", None, 0, None, None).expect("add");
        assert!(store.update("p1", id, None, None, Some("bogus"), None, None).is_err());
    }

    #[test]
    fn deletes_subtasks_recursively() {
        let store = store();
        let parent = store.add("p1", "parent", None, 0, None, None).expect("add parent");
        let child = store.add("p1", "child", None, 0, Some(parent), None).expect("add child");
        store.delete("p1", parent, true).expect("delete");
        assert!(store.get("p1", parent).expect("get").is_none());
        assert!(store.get("p1", child).expect("get").is_none());
    }

    #[test]
    fn list_orders_by_priority_then_created_at() {
        let store = store();
        store.add("p1", "low", None, 0, None, None).expect("add");
        store.add("p1", "high", None, 5, None, None).expect("add");
        let tasks = store.list("p1", None, None).expect("list");
        assert_eq!(tasks[0].title, "high");
    }
}
