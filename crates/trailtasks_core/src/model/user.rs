//! User and session domain models.
//!
//! # Responsibility
//! - Define the signed-in user record published through session updates.
//! - Define the profile document persisted under `users/{uid}`.
//!
//! # Invariants
//! - `uid` is provider-issued and stable for the account lifetime.
//! - A session is either absent (signed out) or holds exactly one user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable provider-issued identifier for an account.
pub type UserId = Uuid;

/// The currently signed-in user as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-issued account identifier.
    pub uid: UserId,
    /// Display name shown in greetings; set from the signup username.
    pub display_name: String,
    /// Synthetic email the account is registered under.
    pub email: String,
    /// Account creation timestamp in epoch milliseconds.
    pub created_at_ms: i64,
}

impl User {
    /// Returns the name to greet the user with; falls back to the email.
    pub fn greeting_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

/// Session presence: `None` when signed out, the user otherwise.
pub type Session = Option<User>;

/// Profile document persisted under `users/{uid}` on signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Username as entered (trimmed).
    pub username: String,
    /// Lowercased username used for the synthetic email derivation.
    pub username_lower: String,
    /// Contact email the user supplied on signup (not the synthetic one).
    pub email: String,
    /// Profile creation timestamp in epoch milliseconds.
    pub created_at_ms: i64,
}
