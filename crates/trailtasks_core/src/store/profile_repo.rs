//! User profile repository over the `users/{uid}` document shape.
//!
//! # Responsibility
//! - Persist and read the profile record written on signup.
//!
//! # Invariants
//! - Writes merge into an existing document rather than replacing it.

use crate::model::user::{UserId, UserProfile};
use crate::store::StoreResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

/// Repository interface for profile documents.
pub trait ProfileRepository {
    /// Writes the profile, merging over any existing document for `uid`.
    fn merge_profile(&self, uid: UserId, profile: &UserProfile) -> StoreResult<()>;
    /// Reads the profile document, when present.
    fn get_profile(&self, uid: UserId) -> StoreResult<Option<UserProfile>>;
}

/// SQLite-backed profile repository.
pub struct SqliteProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProfileRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ProfileRepository for SqliteProfileRepository {
    fn merge_profile(&self, uid: UserId, profile: &UserProfile) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO profiles (uid, username, username_lower, email, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(uid) DO UPDATE SET
                username = excluded.username,
                username_lower = excluded.username_lower,
                email = excluded.email;",
            params![
                uid.to_string(),
                profile.username,
                profile.username_lower,
                profile.email,
                profile.created_at_ms,
            ],
        )?;
        Ok(())
    }

    fn get_profile(&self, uid: UserId) -> StoreResult<Option<UserProfile>> {
        let profile = self
            .conn()
            .query_row(
                "SELECT username, username_lower, email, created_at_ms
                 FROM profiles WHERE uid = ?1;",
                params![uid.to_string()],
                |row| {
                    Ok(UserProfile {
                        username: row.get(0)?,
                        username_lower: row.get(1)?,
                        email: row.get(2)?,
                        created_at_ms: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}
