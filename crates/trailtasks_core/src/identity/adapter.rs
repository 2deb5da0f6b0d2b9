//! Username-based identity adapter and session watch.
//!
//! # Responsibility
//! - Validate usernames and derive the synthetic sign-in email.
//! - Delegate account creation/validation to the identity provider.
//! - Persist the signup profile document and publish session transitions.
//! - Map provider error codes to fixed user-facing sentences.
//!
//! # Invariants
//! - Validation failures never reach the provider.
//! - The synthetic email is `lowercase(trim(username)) + "@trailtasks.local"`,
//!   deterministic and case-insensitive on the username part.
//! - Session subscribers are invoked immediately on registration and on
//!   every subsequent sign-in/sign-out, without the registry lock held.

use crate::identity::provider::{AuthError, AuthErrorCode, IdentityProvider};
use crate::model::user::{Session, User, UserProfile};
use crate::store::profile_repo::ProfileRepository;
use crate::store::StoreError;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

/// Domain suffix appended to lowercased usernames.
pub const SYNTHETIC_EMAIL_DOMAIN: &str = "trailtasks.local";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid username regex"));

/// Username rejections caught before any provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameError {
    /// Empty after trimming.
    Empty,
    /// Contains characters outside letters, digits, `.`, `_`, `-`.
    InvalidCharacters,
}

impl Display for UsernameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "username must not be empty"),
            Self::InvalidCharacters => {
                write!(f, "username may only use letters, digits, '.', '_' or '-'")
            }
        }
    }
}

impl Error for UsernameError {}

/// Adapter-level failures for sign-up/sign-in flows.
#[derive(Debug)]
pub enum IdentityError {
    /// Local validation failure; no provider call was attempted.
    Username(UsernameError),
    /// Provider rejection with one of the fixed error codes.
    Provider(AuthError),
    /// Profile document write failed after account creation.
    Profile(StoreError),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username(err) => write!(f, "{err}"),
            Self::Provider(err) => write!(f, "{err}"),
            Self::Profile(err) => write!(f, "profile write failed: {err}"),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Username(err) => Some(err),
            Self::Provider(err) => Some(err),
            Self::Profile(err) => Some(err),
        }
    }
}

impl From<UsernameError> for IdentityError {
    fn from(value: UsernameError) -> Self {
        Self::Username(value)
    }
}

impl From<AuthError> for IdentityError {
    fn from(value: AuthError) -> Self {
        Self::Provider(value)
    }
}

/// Trims and validates a username, returning the cleaned form.
pub fn validate_username(username: &str) -> Result<String, UsernameError> {
    let cleaned = username.trim();
    if cleaned.is_empty() {
        return Err(UsernameError::Empty);
    }
    if !USERNAME_RE.is_match(cleaned) {
        return Err(UsernameError::InvalidCharacters);
    }
    Ok(cleaned.to_string())
}

/// Lowercases a trimmed username for the synthetic email local part.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Derives the deterministic synthetic email for a username.
pub fn synthetic_email(username: &str) -> String {
    format!("{}@{SYNTHETIC_EMAIL_DOMAIN}", normalize_username(username))
}

/// Static table from provider error code to user-facing sentence.
///
/// Codes outside the fixed set map to the generic sign-in fallback.
pub fn auth_error_message(code: &AuthErrorCode) -> &'static str {
    match code {
        AuthErrorCode::AccountExists => "That username is already taken. Try another.",
        AuthErrorCode::InvalidEmail => "Please enter a valid email address.",
        AuthErrorCode::WeakPassword => "Password must be at least 6 characters.",
        AuthErrorCode::AccountDisabled => "This account has been disabled. Contact support.",
        AuthErrorCode::AccountNotFound => "No account found with that username.",
        AuthErrorCode::WrongCredential => "Incorrect password. Please try again.",
        AuthErrorCode::RateLimited => "Too many attempts. Please wait and try again.",
        AuthErrorCode::Other(_) => "Unable to sign in right now. Please try again.",
    }
}

/// User-facing sentence for a sign-up failure.
pub fn sign_up_error_message(error: &IdentityError) -> &'static str {
    match error {
        IdentityError::Username(UsernameError::Empty) => {
            "Please enter a username to personalize your trail list."
        }
        IdentityError::Username(UsernameError::InvalidCharacters) => {
            "Username can use letters, numbers, \".\", \"_\" or \"-\" only."
        }
        IdentityError::Provider(err) => auth_error_message(&err.code),
        IdentityError::Profile(_) => "Something went wrong. Please try again.",
    }
}

/// User-facing sentence for a sign-in failure.
pub fn sign_in_error_message(error: &IdentityError) -> &'static str {
    match error {
        IdentityError::Username(UsernameError::Empty) => "Please enter your username.",
        IdentityError::Username(UsernameError::InvalidCharacters) => {
            "Username can use letters, numbers, \".\", \"_\" or \"-\" only."
        }
        IdentityError::Provider(err) => auth_error_message(&err.code),
        IdentityError::Profile(_) => "Something went wrong. Please try again.",
    }
}

pub type SessionCallback = Box<dyn FnMut(Option<&User>) + Send>;

#[derive(Default)]
struct SessionState {
    current: Session,
    subscribers: Vec<(u64, SessionCallback)>,
    /// Ids cancelled while checked out by an in-flight publish.
    retired: Vec<u64>,
    next_id: u64,
}

/// Disposer for one session-watch registration.
pub struct SessionSubscription {
    state: Weak<Mutex<SessionState>>,
    id: u64,
    active: bool,
}

impl SessionSubscription {
    /// Stops session-change delivery. Safe to call more than once.
    pub fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.lock().unwrap_or_else(|err| err.into_inner());
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != self.id);
        if state.subscribers.len() == before {
            state.retired.push(self.id);
        }
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Adapter over the identity provider and the profile document store.
pub struct IdentityAdapter<P: IdentityProvider, R: ProfileRepository> {
    provider: P,
    profiles: R,
    state: Arc<Mutex<SessionState>>,
}

impl<P: IdentityProvider, R: ProfileRepository> IdentityAdapter<P, R> {
    pub fn new(provider: P, profiles: R) -> Self {
        Self {
            provider,
            profiles,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Creates an account for `username`, writes the profile document, and
    /// publishes the fresh session.
    ///
    /// `contact_email` is the address the user typed on the signup form; it
    /// is stored in the profile, not used for authentication.
    pub fn sign_up(
        &self,
        username: &str,
        password: &str,
        contact_email: &str,
    ) -> Result<User, IdentityError> {
        let cleaned = validate_username(username)?;
        let email = synthetic_email(&cleaned);

        let account = self.provider.create_account(&email, password)?;
        self.provider.update_display_name(account.uid, &cleaned)?;

        let profile = UserProfile {
            username: cleaned.clone(),
            username_lower: normalize_username(&cleaned),
            email: contact_email.trim().to_string(),
            created_at_ms: now_epoch_ms(),
        };
        self.profiles
            .merge_profile(account.uid, &profile)
            .map_err(IdentityError::Profile)?;

        let user = User {
            uid: account.uid,
            display_name: cleaned,
            email,
            created_at_ms: account.created_at_ms,
        };
        info!(
            "event=auth_sign_up module=identity status=ok uid={}",
            user.uid
        );
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Signs in with the synthetic email derived from `username` and
    /// publishes the fresh session.
    pub fn sign_in(&self, username: &str, password: &str) -> Result<User, IdentityError> {
        let cleaned = validate_username(username)?;
        let email = synthetic_email(&cleaned);

        let account = self.provider.sign_in(&email, password)?;
        let user = User {
            uid: account.uid,
            display_name: account.display_name.unwrap_or_default(),
            email,
            created_at_ms: account.created_at_ms,
        };
        info!(
            "event=auth_sign_in module=identity status=ok uid={}",
            user.uid
        );
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Signs out. The local session is cleared even when the provider
    /// reports a failure; the adapter does not retry.
    pub fn sign_out(&self) {
        if let Err(err) = self.provider.sign_out() {
            warn!("event=auth_sign_out module=identity status=error error={err}");
        } else {
            info!("event=auth_sign_out module=identity status=ok");
        }
        self.publish(None);
    }

    /// Returns a clone of the current session.
    pub fn current_session(&self) -> Session {
        self.lock().current.clone()
    }

    /// Registers a session-change callback.
    ///
    /// The callback is invoked immediately with the current session and
    /// again on every subsequent transition until the handle is cancelled
    /// or dropped.
    pub fn subscribe<F>(&self, callback: F) -> SessionSubscription
    where
        F: FnMut(Option<&User>) + Send + 'static,
    {
        let mut callback: SessionCallback = Box::new(callback);
        let current = self.current_session();
        callback(current.as_ref());

        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, callback));
        SessionSubscription {
            state: Arc::downgrade(&self.state),
            id,
            active: true,
        }
    }

    fn publish(&self, session: Session) {
        // Check subscribers out of the lock so callbacks can re-enter the
        // adapter (read the session, register, cancel).
        let mut checked_out = {
            let mut state = self.lock();
            state.current = session.clone();
            std::mem::take(&mut state.subscribers)
        };

        for (_, callback) in checked_out.iter_mut() {
            callback(session.as_ref());
        }

        let mut state = self.lock();
        let added = std::mem::replace(&mut state.subscribers, checked_out);
        state.subscribers.extend(added);

        let retired = std::mem::take(&mut state.retired);
        if !retired.is_empty() {
            state.subscribers.retain(|(id, _)| !retired.contains(id));
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
