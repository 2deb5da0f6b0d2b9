//! Default-task seeding for first-time users.
//!
//! # Responsibility
//! - Populate a brand-new user's collection with a randomized subset of
//!   the fixed candidate pool.
//!
//! # Invariants
//! - Runs at most once per user under normal flow, guarded by a bounded
//!   collection-emptiness probe rather than a dedicated flag. Within one
//!   process the store serializes mutations, so interleaved calls cannot
//!   both observe emptiness; the cross-process race is accepted.
//! - Seeded tasks carry `completed = false` and `order = position` within
//!   the shuffled selection.

use crate::model::user::UserId;
use crate::store::todo_store::TodoStore;
use crate::store::StoreError;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SEED_COUNT_MIN: usize = 8;
const SEED_COUNT_MAX: usize = 12;

/// Fixed candidate pool for default trail tasks.
pub const DEFAULT_TASK_POOL: [&str; 19] = [
    "Pack 2 liters of water",
    "Check trail weather and alerts",
    "Charge headlamp batteries",
    "Pack a lightweight rain jacket",
    "Download offline trail map",
    "Stretch calves and ankles",
    "Add trail mix and snacks",
    "Bring a small first-aid kit",
    "Spot three bird species",
    "Photograph a wildflower",
    "Stay on marked trail paths",
    "Pack out all trash",
    "Clean hiking boots after return",
    "Refill water bottles for next hike",
    "Log trail notes in journal",
    "Review route with hiking buddy",
    "Set out sunscreen and hat",
    "Pack trekking poles",
    "Leave a trip plan with a friend",
];

pub type SeedingResult<T> = Result<T, SeedingError>;

/// Seeding failure; treated as a subscription-setup failure upstream.
#[derive(Debug)]
pub enum SeedingError {
    Store(StoreError),
}

impl Display for SeedingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "seeding failed: {err}"),
        }
    }
}

impl Error for SeedingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for SeedingError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Seeds default tasks when the user's collection is empty.
///
/// Returns the number of tasks created: zero for a non-empty collection,
/// otherwise a value in `[8, 12]`.
///
/// # Errors
/// - Propagates the first store failure; tasks created before the failure
///   remain (no rollback).
pub fn ensure_default_todos(store: &dyn TodoStore, uid: UserId) -> SeedingResult<usize> {
    if store.has_any(uid)? {
        return Ok(0);
    }

    let selection = pick_random_defaults();
    for (position, text) in selection.iter().enumerate() {
        store.add_seeded(uid, text, position as i64)?;
    }

    info!(
        "event=seed_defaults module=seed status=ok uid={uid} count={}",
        selection.len()
    );
    Ok(selection.len())
}

/// Shuffles the pool and takes a uniform-random count in `[8, 12]`.
fn pick_random_defaults() -> Vec<&'static str> {
    let mut rng = rand::thread_rng();
    let count = rng.gen_range(SEED_COUNT_MIN..=SEED_COUNT_MAX);
    let mut pool = DEFAULT_TASK_POOL.to_vec();
    pool.shuffle(&mut rng);
    pool.truncate(count);
    pool
}
