//! Document-store boundary: per-user todo collections and profile docs.
//!
//! # Responsibility
//! - Define the store error taxonomy shared by repositories and adapter.
//! - Expose the todo CRUD/live-query adapter and the profile repository.
//!
//! # Invariants
//! - A task is visible only through its owning user's collection.
//! - Snapshots are complete ordered views, never deltas.

use crate::db::DbError;
use crate::model::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod live;
pub mod profile_repo;
pub mod todo_repo;
pub mod todo_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer failures for todo and profile operations.
#[derive(Debug)]
pub enum StoreError {
    /// Task text is empty after trimming.
    EmptyText,
    /// Target task does not exist in the user's collection.
    NotFound(TaskId),
    /// Transport-level storage failure.
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "task text must not be empty"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyText | Self::NotFound(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
