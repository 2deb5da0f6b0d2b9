//! Todo repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and ordered-list access over per-user todo collections.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths reject empty trimmed text before SQL mutations.
//! - List order is `created_at_ms` ascending with insert sequence as
//!   tie-breaker, matching snapshot delivery order.

use crate::model::task::{Task, TaskId};
use crate::model::user::UserId;
use crate::store::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT id, text, completed, created_at_ms, display_order
FROM todos";

/// Repository interface for one user's todo collection.
pub trait TodoRepository {
    /// Inserts a task; `order` is set only by the seeding batch.
    fn insert_task(&self, uid: UserId, text: &str, order: Option<i64>) -> StoreResult<TaskId>;
    /// Updates only the `completed` field; last write wins.
    fn set_completed(&self, uid: UserId, id: TaskId, completed: bool) -> StoreResult<()>;
    /// Removes the task document.
    fn delete_task(&self, uid: UserId, id: TaskId) -> StoreResult<()>;
    /// Returns the full ordered collection.
    fn list_tasks(&self, uid: UserId) -> StoreResult<Vec<Task>>;
    /// Bounded existence probe (LIMIT 1).
    fn has_any(&self, uid: UserId) -> StoreResult<bool>;
}

/// SQLite-backed todo repository.
pub struct SqliteTodoRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTodoRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl TodoRepository for SqliteTodoRepository {
    fn insert_task(&self, uid: UserId, text: &str, order: Option<i64>) -> StoreResult<TaskId> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyText);
        }

        let id = Uuid::new_v4();
        self.conn().execute(
            "INSERT INTO todos (id, user_uid, text, completed, created_at_ms, display_order)
             VALUES (?1, ?2, ?3, 0, (strftime('%s', 'now') * 1000), ?4);",
            params![id.to_string(), uid.to_string(), trimmed, order],
        )?;

        Ok(id)
    }

    fn set_completed(&self, uid: UserId, id: TaskId, completed: bool) -> StoreResult<()> {
        let changed = self.conn().execute(
            "UPDATE todos SET completed = ?1 WHERE user_uid = ?2 AND id = ?3;",
            params![i64::from(completed), uid.to_string(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn delete_task(&self, uid: UserId, id: TaskId) -> StoreResult<()> {
        let changed = self.conn().execute(
            "DELETE FROM todos WHERE user_uid = ?1 AND id = ?2;",
            params![uid.to_string(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn list_tasks(&self, uid: UserId) -> StoreResult<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE user_uid = ?1
             ORDER BY created_at_ms ASC, seq ASC;"
        ))?;

        let rows = stmt.query_map(params![uid.to_string()], |row| {
            let raw_id: String = row.get(0)?;
            Ok((
                raw_id,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<i64>>(4)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (raw_id, text, completed, created_at_ms, order) = row?;
            let id = Uuid::parse_str(&raw_id).map_err(|err| {
                StoreError::Db(crate::db::DbError::Sqlite(
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(err),
                    ),
                ))
            })?;
            tasks.push(Task {
                id,
                text,
                completed: completed != 0,
                created_at_ms,
                order,
            });
        }
        Ok(tasks)
    }

    fn has_any(&self, uid: UserId) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM todos WHERE user_uid = ?1 LIMIT 1;",
                params![uid.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
