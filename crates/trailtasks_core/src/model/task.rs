//! Task domain model and filter views.
//!
//! # Responsibility
//! - Define the canonical task record mirrored from store snapshots.
//! - Provide the all/active/completed filter partition helpers.
//!
//! # Invariants
//! - `id` is store-issued and unique within one user's collection.
//! - `order` is set only by the seeding batch; user-added tasks carry `None`.
//! - The three filter views partition any task list by identifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable store-issued identifier for a task document.
pub type TaskId = Uuid;

/// One task document inside a user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-issued stable identifier.
    pub id: TaskId,
    /// Non-empty trimmed task text.
    pub text: String,
    /// Completion flag; toggled by the user, defaults to `false`.
    pub completed: bool,
    /// Store-assigned creation timestamp in epoch milliseconds.
    pub created_at_ms: i64,
    /// Seeding batch position; `None` for user-added tasks.
    pub order: Option<i64>,
}

/// Filter selection over a task snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    /// Every task in snapshot order.
    #[default]
    All,
    /// Tasks with `completed == false`.
    Active,
    /// Tasks with `completed == true`.
    Completed,
}

impl TaskFilter {
    /// Returns whether a task belongs to this filter's view.
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

/// Returns the subset of `tasks` visible under `filter`, preserving order.
pub fn filter_tasks(tasks: &[Task], filter: TaskFilter) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect()
}

/// Returns the number of not-yet-completed tasks.
pub fn active_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| !task.completed).count()
}
