//! Embedded SQLite-backed identity provider.
//!
//! # Responsibility
//! - Implement the `IdentityProvider` contract against the `accounts` table.
//! - Keep credential material as salted digests, never plain text.
//!
//! # Invariants
//! - Passwords are stored as `sha256(salt || password)` hex digests.
//! - Consecutive sign-in failures are counted per account; the counter is
//!   reset on success and enforced before the password check.
//! - A full lockout decays once no failure has been recorded for
//!   `LOCKOUT_WINDOW_MS`; it is never permanent.

use crate::identity::provider::{
    AuthError, AuthErrorCode, AuthResult, IdentityProvider, ProviderUser,
};
use crate::model::user::UserId;
use log::{error, warn};
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const MIN_PASSWORD_CHARS: usize = 6;
const MAX_FAILED_ATTEMPTS: i64 = 5;
const LOCKOUT_WINDOW_MS: i64 = 15 * 60 * 1000;
const SALT_BYTES: usize = 16;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// SQLite-backed provider standing in for the hosted identity service.
pub struct LocalIdentityProvider {
    conn: Arc<Mutex<Connection>>,
}

impl LocalIdentityProvider {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn create_account(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        if !is_valid_email(email) {
            return Err(AuthError::new(AuthErrorCode::InvalidEmail));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::new(AuthErrorCode::WeakPassword));
        }

        let conn = self.conn();
        let existing: Option<String> = conn
            .query_row(
                "SELECT uid FROM accounts WHERE email = ?1;",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;
        if existing.is_some() {
            return Err(AuthError::new(AuthErrorCode::AccountExists));
        }

        let uid = Uuid::new_v4();
        let salt = new_salt();
        let digest = password_digest(&salt, password);
        let created_at_ms = now_epoch_ms();

        conn.execute(
            "INSERT INTO accounts (
                uid, email, password_salt, password_digest, created_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![uid.to_string(), email, salt, digest, created_at_ms],
        )
        .map_err(storage_error)?;

        Ok(ProviderUser {
            uid,
            email: email.to_string(),
            display_name: None,
            created_at_ms,
        })
    }

    fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        let conn = self.conn();
        let row: Option<AccountRow> = conn
            .query_row(
                "SELECT uid, password_salt, password_digest, display_name,
                        disabled, failed_attempts, last_failed_at_ms, created_at_ms
                 FROM accounts WHERE email = ?1;",
                params![email],
                AccountRow::from_row,
            )
            .optional()
            .map_err(storage_error)?;

        let Some(account) = row else {
            return Err(AuthError::new(AuthErrorCode::AccountNotFound));
        };
        if account.disabled {
            return Err(AuthError::new(AuthErrorCode::AccountDisabled));
        }
        if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
            let now = now_epoch_ms();
            if now.saturating_sub(account.last_failed_at_ms) < LOCKOUT_WINDOW_MS {
                warn!(
                    "event=auth_sign_in module=identity status=rate_limited failed_attempts={}",
                    account.failed_attempts
                );
                return Err(AuthError::new(AuthErrorCode::RateLimited));
            }
            // The lock window has elapsed; the counter starts over.
            conn.execute(
                "UPDATE accounts SET failed_attempts = 0 WHERE uid = ?1;",
                params![account.uid],
            )
            .map_err(storage_error)?;
        }

        if password_digest(&account.salt, password) != account.digest {
            conn.execute(
                "UPDATE accounts SET failed_attempts = failed_attempts + 1,
                        last_failed_at_ms = ?2
                 WHERE uid = ?1;",
                params![account.uid, now_epoch_ms()],
            )
            .map_err(storage_error)?;
            return Err(AuthError::new(AuthErrorCode::WrongCredential));
        }

        conn.execute(
            "UPDATE accounts SET failed_attempts = 0 WHERE uid = ?1;",
            params![account.uid],
        )
        .map_err(storage_error)?;

        Ok(ProviderUser {
            uid: parse_uid(&account.uid)?,
            email: email.to_string(),
            display_name: account.display_name,
            created_at_ms: account.created_at_ms,
        })
    }

    fn sign_out(&self) -> AuthResult<()> {
        // The embedded provider keeps no server-side session state.
        Ok(())
    }

    fn update_display_name(&self, uid: UserId, name: &str) -> AuthResult<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE accounts SET display_name = ?1 WHERE uid = ?2;",
                params![name, uid.to_string()],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(AuthError::new(AuthErrorCode::AccountNotFound));
        }
        Ok(())
    }
}

struct AccountRow {
    uid: String,
    salt: String,
    digest: String,
    display_name: Option<String>,
    disabled: bool,
    failed_attempts: i64,
    last_failed_at_ms: i64,
    created_at_ms: i64,
}

impl AccountRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uid: row.get(0)?,
            salt: row.get(1)?,
            digest: row.get(2)?,
            display_name: row.get(3)?,
            disabled: row.get::<_, i64>(4)? != 0,
            failed_attempts: row.get(5)?,
            last_failed_at_ms: row.get(6)?,
            created_at_ms: row.get(7)?,
        })
    }
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn new_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn parse_uid(raw: &str) -> AuthResult<UserId> {
    Uuid::parse_str(raw).map_err(|err| {
        error!("event=auth_sign_in module=identity status=error error_code=bad_uid error={err}");
        AuthError::new(AuthErrorCode::Other(format!("malformed account id: {err}")))
    })
}

fn storage_error(err: rusqlite::Error) -> AuthError {
    error!("event=auth_storage module=identity status=error error={err}");
    AuthError::new(AuthErrorCode::Other(format!("storage failure: {err}")))
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_email, password_digest, to_hex};

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("trailblazer@trailtasks.local"));
        assert!(is_valid_email("t@example.com"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@local.part"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn digest_is_deterministic_and_salt_sensitive() {
        let a = password_digest("salt-a", "summit1");
        let b = password_digest("salt-a", "summit1");
        let c = password_digest("salt-b", "summit1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hex_encoding_is_lowercase_two_chars_per_byte() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x0a]), "00ff0a");
    }
}
