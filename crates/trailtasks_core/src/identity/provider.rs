//! Identity provider contract and error taxonomy.
//!
//! # Responsibility
//! - Define the operations the external identity provider must support.
//! - Define the fixed set of provider error codes the adapter consumes.
//!
//! # Invariants
//! - Provider implementations authenticate by email; the username-to-email
//!   mapping lives in the adapter, never here.

use crate::model::user::UserId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AuthResult<T> = Result<T, AuthError>;

/// Fixed provider error codes consumed by the adapter's message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// An account already exists for the derived email.
    AccountExists,
    /// Email fails the provider's format check.
    InvalidEmail,
    /// Password fails the provider's strength policy.
    WeakPassword,
    /// Account exists but has been disabled.
    AccountDisabled,
    /// No account exists for the derived email.
    AccountNotFound,
    /// Account exists but the password does not match.
    WrongCredential,
    /// Too many failed attempts in a row.
    RateLimited,
    /// Any code outside the fixed set; mapped to the generic fallback.
    Other(String),
}

/// Provider rejection carrying one of the fixed error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub code: AuthErrorCode,
}

impl AuthError {
    pub fn new(code: AuthErrorCode) -> Self {
        Self { code }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            AuthErrorCode::AccountExists => write!(f, "account already exists"),
            AuthErrorCode::InvalidEmail => write!(f, "invalid email format"),
            AuthErrorCode::WeakPassword => write!(f, "password too weak"),
            AuthErrorCode::AccountDisabled => write!(f, "account disabled"),
            AuthErrorCode::AccountNotFound => write!(f, "account not found"),
            AuthErrorCode::WrongCredential => write!(f, "wrong credential"),
            AuthErrorCode::RateLimited => write!(f, "rate limited"),
            AuthErrorCode::Other(code) => write!(f, "provider error: {code}"),
        }
    }
}

impl Error for AuthError {}

/// Account record returned by provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    /// Provider-issued stable account identifier.
    pub uid: UserId,
    /// Email the account is registered under.
    pub email: String,
    /// Display name, when one has been set.
    pub display_name: Option<String>,
    /// Account creation timestamp in epoch milliseconds.
    pub created_at_ms: i64,
}

/// External identity provider boundary.
///
/// # Contract
/// - `create_account` rejects duplicates with `AccountExists`, malformed
///   emails with `InvalidEmail`, and short passwords with `WeakPassword`.
/// - `sign_in` rejects unknown emails with `AccountNotFound`, bad passwords
///   with `WrongCredential`, disabled accounts with `AccountDisabled`, and
///   repeated failures with `RateLimited`.
/// - `sign_out` never fails for local reasons.
pub trait IdentityProvider {
    fn create_account(&self, email: &str, password: &str) -> AuthResult<ProviderUser>;
    fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser>;
    fn sign_out(&self) -> AuthResult<()>;
    fn update_display_name(&self, uid: UserId, name: &str) -> AuthResult<()>;
}
