//! Core domain logic for TrailTasks.
//! This crate is the single source of truth for session and todo invariants.

pub mod controller;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod seed;
pub mod store;

pub use controller::{
    Phase, TodoController, ADD_ERROR_MESSAGE, DELETE_ERROR_MESSAGE, LOAD_ERROR_MESSAGE,
    PREPARE_ERROR_MESSAGE, UPDATE_ERROR_MESSAGE,
};
pub use identity::adapter::{
    auth_error_message, sign_in_error_message, sign_up_error_message, synthetic_email,
    validate_username, IdentityAdapter, IdentityError, SessionSubscription, UsernameError,
    SYNTHETIC_EMAIL_DOMAIN,
};
pub use identity::local_provider::LocalIdentityProvider;
pub use identity::provider::{AuthError, AuthErrorCode, AuthResult, IdentityProvider, ProviderUser};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{active_count, filter_tasks, Task, TaskFilter, TaskId};
pub use model::user::{Session, User, UserId, UserProfile};
pub use seed::{ensure_default_todos, SeedingError, DEFAULT_TASK_POOL};
pub use store::live::TodoSubscription;
pub use store::profile_repo::{ProfileRepository, SqliteProfileRepository};
pub use store::todo_store::{SqliteTodoStore, TodoStore};
pub use store::{StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
