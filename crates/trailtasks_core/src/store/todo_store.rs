//! Todo store adapter: mutations plus live snapshot delivery.
//!
//! # Responsibility
//! - Expose the per-user todo operations the controller dispatches.
//! - Re-read and fan out the full ordered snapshot after every
//!   acknowledged mutation.
//!
//! # Invariants
//! - Mutations never return partial views; observers only ever see full
//!   snapshots in collection order.
//! - `clear_completed` is a fan-out of independent deletes with no
//!   rollback; individual failures are logged, not aggregated.

use crate::model::task::{Task, TaskId};
use crate::model::user::UserId;
use crate::store::live::{SnapshotCallback, SnapshotHub, StoreErrorCallback, TodoSubscription};
use crate::store::todo_repo::{SqliteTodoRepository, TodoRepository};
use crate::store::StoreResult;
use log::{info, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Store adapter boundary consumed by the seeding service and controller.
pub trait TodoStore {
    /// Creates a task with `completed = false` and a store-assigned
    /// creation timestamp.
    fn add(&self, uid: UserId, text: &str) -> StoreResult<TaskId>;
    /// Creates one task of the seeding batch, stamped with its position.
    fn add_seeded(&self, uid: UserId, text: &str, order: i64) -> StoreResult<TaskId>;
    /// Updates only the `completed` field to the given value.
    fn toggle(&self, uid: UserId, id: TaskId, completed: bool) -> StoreResult<()>;
    /// Removes the task document.
    fn delete(&self, uid: UserId, id: TaskId) -> StoreResult<()>;
    /// Bounded existence probe over the user's collection.
    fn has_any(&self, uid: UserId) -> StoreResult<bool>;
    /// Deletes every currently-completed task; returns how many deletes
    /// succeeded. Partial failure leaves the rest in place.
    fn clear_completed(&self, uid: UserId) -> StoreResult<usize>;
    /// Opens a live query ordered by creation time. The callback receives
    /// the current snapshot immediately and after every acknowledged
    /// change. Fails without registering when the initial read fails.
    fn subscribe(
        &self,
        uid: UserId,
        on_snapshot: SnapshotCallback,
        on_error: StoreErrorCallback,
    ) -> StoreResult<TodoSubscription>;
}

/// Embedded SQLite-backed todo store.
pub struct SqliteTodoStore {
    repo: SqliteTodoRepository,
    hub: SnapshotHub,
}

impl SqliteTodoStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            repo: SqliteTodoRepository::new(conn),
            hub: SnapshotHub::new(),
        }
    }

    /// Re-reads the user's collection and fans it out to subscribers.
    ///
    /// A failed re-read is delivered through the error callbacks so the
    /// subscription surface matches a remote live query losing transport.
    fn sync_subscribers(&self, uid: UserId) {
        match self.repo.list_tasks(uid) {
            Ok(tasks) => self.hub.publish(uid, &tasks),
            Err(err) => {
                warn!("event=live_sync module=store status=error error={err}");
                self.hub.publish_error(uid, &err);
            }
        }
    }
}

impl TodoStore for SqliteTodoStore {
    fn add(&self, uid: UserId, text: &str) -> StoreResult<TaskId> {
        let id = self.repo.insert_task(uid, text, None)?;
        self.sync_subscribers(uid);
        Ok(id)
    }

    fn add_seeded(&self, uid: UserId, text: &str, order: i64) -> StoreResult<TaskId> {
        let id = self.repo.insert_task(uid, text, Some(order))?;
        self.sync_subscribers(uid);
        Ok(id)
    }

    fn toggle(&self, uid: UserId, id: TaskId, completed: bool) -> StoreResult<()> {
        self.repo.set_completed(uid, id, completed)?;
        self.sync_subscribers(uid);
        Ok(())
    }

    fn delete(&self, uid: UserId, id: TaskId) -> StoreResult<()> {
        self.repo.delete_task(uid, id)?;
        self.sync_subscribers(uid);
        Ok(())
    }

    fn has_any(&self, uid: UserId) -> StoreResult<bool> {
        self.repo.has_any(uid)
    }

    fn clear_completed(&self, uid: UserId) -> StoreResult<usize> {
        let completed: Vec<TaskId> = self
            .repo
            .list_tasks(uid)?
            .into_iter()
            .filter(|task| task.completed)
            .map(|task| task.id)
            .collect();

        let mut deleted = 0;
        for id in completed {
            match self.delete(uid, id) {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!(
                        "event=clear_completed module=store status=error task_id={id} error={err}"
                    );
                }
            }
        }
        info!("event=clear_completed module=store status=ok deleted={deleted}");
        Ok(deleted)
    }

    fn subscribe(
        &self,
        uid: UserId,
        mut on_snapshot: SnapshotCallback,
        on_error: StoreErrorCallback,
    ) -> StoreResult<TodoSubscription> {
        // Initial read happens before registration: when it fails, the
        // caller gets an error and holds no disposer to clean up.
        let tasks = self.repo.list_tasks(uid)?;
        on_snapshot(&tasks);
        Ok(self.hub.subscribe(uid, on_snapshot, on_error))
    }
}
