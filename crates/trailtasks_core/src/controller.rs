//! Session/todo controller: the application root the presentation renders.
//!
//! # Responsibility
//! - Own the session phase machine and the mirrored task snapshot.
//! - Trigger default-task seeding once per fresh session, then open the
//!   live subscription.
//! - Dispatch user actions to the store and derive filtered views/counts.
//!
//! # Invariants
//! - Mutating actions are fire-and-forget: the visible task list changes
//!   only when the live subscription delivers the next snapshot, never
//!   optimistically.
//! - Each action converts its own failure into a fixed user-facing
//!   sentence; no store error propagates raw to the presentation.
//! - No internal lock is held across store calls; snapshot callbacks
//!   re-enter the controller state synchronously.
//! - Selection and filter state reset on every signed-out transition.

use crate::identity::adapter::{IdentityAdapter, SessionSubscription};
use crate::identity::provider::IdentityProvider;
use crate::model::task::{active_count, filter_tasks, Task, TaskFilter, TaskId};
use crate::model::user::{Session, User, UserId};
use crate::seed::ensure_default_todos;
use crate::store::live::TodoSubscription;
use crate::store::profile_repo::ProfileRepository;
use crate::store::todo_store::TodoStore;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Fixed sentence shown when seeding fails during session setup.
pub const PREPARE_ERROR_MESSAGE: &str = "Unable to prepare your TrailTasks right now.";
/// Fixed sentence shown when the live query cannot be opened or drops.
pub const LOAD_ERROR_MESSAGE: &str = "Unable to load your TrailTasks right now.";
/// Fixed sentence shown when an add action fails.
pub const ADD_ERROR_MESSAGE: &str = "Unable to add that trail task. Please try again.";
/// Fixed sentence shown when a toggle action fails.
pub const UPDATE_ERROR_MESSAGE: &str = "Unable to update that trail task. Please try again.";
/// Fixed sentence shown when a delete action fails.
pub const DELETE_ERROR_MESSAGE: &str = "Unable to delete that trail task. Please try again.";

/// Session-presence phase of the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// No session; list empty, no subscription.
    #[default]
    SignedOut,
    /// Session acquired; seeding and subscription setup in progress.
    Loading,
    /// Subscription active; task list mirrors the latest snapshot.
    Ready,
    /// Setup failed; session retained, error banner shown, no
    /// subscription. Recoverable only via sign-out/retry.
    Failed,
}

#[derive(Default)]
struct ControllerState {
    phase: Phase,
    session: Session,
    tasks: Vec<Task>,
    filter: TaskFilter,
    selected: Option<TaskId>,
    error: Option<&'static str>,
    subscription: Option<TodoSubscription>,
}

/// Application root wiring identity, seeding, and the todo store together.
///
/// Holds exactly one session subscription for its lifetime; dropping the
/// controller tears down both the session watch and any live query.
pub struct TodoController {
    store: Arc<dyn TodoStore + Send + Sync>,
    state: Arc<Mutex<ControllerState>>,
    _session_sub: SessionSubscription,
}

impl TodoController {
    /// Mounts the controller on the identity adapter's session stream.
    ///
    /// The registration callback fires immediately, so a controller started
    /// against an already-signed-in adapter seeds and subscribes before
    /// this constructor returns.
    pub fn start<P, R>(
        identity: &IdentityAdapter<P, R>,
        store: Arc<dyn TodoStore + Send + Sync>,
    ) -> Self
    where
        P: IdentityProvider,
        R: ProfileRepository,
    {
        let state = Arc::new(Mutex::new(ControllerState::default()));
        let callback_state = Arc::clone(&state);
        let callback_store = Arc::clone(&store);
        let session_sub = identity.subscribe(move |user| {
            handle_session_change(&callback_state, &callback_store, user);
        });

        Self {
            store,
            state,
            _session_sub: session_sub,
        }
    }

    // ----- actions ---------------------------------------------------

    /// Adds a task from input text. Blank input is a silent no-op.
    pub fn add(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let Some(uid) = self.session_uid() else {
            return;
        };
        if let Err(err) = self.store.add(uid, trimmed) {
            warn!("event=todo_add module=controller status=error error={err}");
            self.set_error(ADD_ERROR_MESSAGE);
        }
    }

    /// Flips the completion flag of the task as currently snapshotted.
    /// Unknown ids are ignored.
    pub fn toggle(&self, id: TaskId) {
        let Some((uid, completed)) = self.uid_and_completed(id) else {
            return;
        };
        if let Err(err) = self.store.toggle(uid, id, !completed) {
            warn!("event=todo_toggle module=controller status=error error={err}");
            self.set_error(UPDATE_ERROR_MESSAGE);
        }
    }

    /// Deletes one task.
    pub fn delete(&self, id: TaskId) {
        let Some(uid) = self.session_uid() else {
            return;
        };
        if let Err(err) = self.store.delete(uid, id) {
            warn!("event=todo_delete module=controller status=error error={err}");
            self.set_error(DELETE_ERROR_MESSAGE);
        }
    }

    /// Deletes every currently-completed task (independent fan-out,
    /// no rollback on partial failure).
    pub fn clear_completed(&self) {
        let Some(uid) = self.session_uid() else {
            return;
        };
        if let Err(err) = self.store.clear_completed(uid) {
            warn!("event=clear_completed module=controller status=error error={err}");
            self.set_error(DELETE_ERROR_MESSAGE);
        }
    }

    /// Switches the active filter view.
    pub fn set_filter(&self, filter: TaskFilter) {
        self.lock().filter = filter;
    }

    /// Updates the auxiliary selected-task id.
    pub fn select(&self, id: Option<TaskId>) {
        self.lock().selected = id;
    }

    /// Toggles the selected task's completion from the global keyboard
    /// shortcut. Applies regardless of the current filter; a stale
    /// selection is ignored.
    pub fn toggle_selected(&self) {
        let selected = self.lock().selected;
        if let Some(id) = selected {
            self.toggle(id);
        }
    }

    // ----- derived views ---------------------------------------------

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn session(&self) -> Option<User> {
        self.lock().session.clone()
    }

    /// Latest full snapshot in collection order.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn filter(&self) -> TaskFilter {
        self.lock().filter
    }

    /// Snapshot subset visible under the active filter.
    pub fn filtered_tasks(&self) -> Vec<Task> {
        let state = self.lock();
        filter_tasks(&state.tasks, state.filter)
    }

    /// Number of not-yet-completed tasks in the latest snapshot.
    pub fn active_count(&self) -> usize {
        active_count(&self.lock().tasks)
    }

    pub fn selected(&self) -> Option<TaskId> {
        self.lock().selected
    }

    /// Current user-facing error sentence, when one is pending.
    pub fn error(&self) -> Option<&'static str> {
        self.lock().error
    }

    /// Clears the pending error banner.
    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    // ----- internals -------------------------------------------------

    fn session_uid(&self) -> Option<UserId> {
        self.lock().session.as_ref().map(|user| user.uid)
    }

    fn uid_and_completed(&self, id: TaskId) -> Option<(UserId, bool)> {
        let state = self.lock();
        let uid = state.session.as_ref()?.uid;
        let task = state.tasks.iter().find(|task| task.id == id)?;
        Some((uid, task.completed))
    }

    fn set_error(&self, message: &'static str) {
        self.lock().error = Some(message);
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

fn handle_session_change(
    state: &Arc<Mutex<ControllerState>>,
    store: &Arc<dyn TodoStore + Send + Sync>,
    user: Option<&User>,
) {
    match user {
        Some(user) => enter_loading(state, store, user),
        None => enter_signed_out(state),
    }
}

/// Session acquired: reset view state, seed, then open the live query.
fn enter_loading(
    state: &Arc<Mutex<ControllerState>>,
    store: &Arc<dyn TodoStore + Send + Sync>,
    user: &User,
) {
    let uid = user.uid;
    let previous_sub = {
        let mut guard = lock_state(state);
        guard.session = Some(user.clone());
        guard.phase = Phase::Loading;
        guard.error = None;
        guard.tasks.clear();
        guard.selected = None;
        guard.subscription.take()
    };
    drop(previous_sub);

    info!("event=session_acquired module=controller status=ok uid={uid}");

    if let Err(err) = ensure_default_todos(store.as_ref(), uid) {
        warn!("event=session_setup module=controller status=error stage=seed error={err}");
        let mut guard = lock_state(state);
        guard.phase = Phase::Failed;
        guard.error = Some(PREPARE_ERROR_MESSAGE);
        return;
    }

    let snapshot_state = Arc::clone(state);
    let error_state = Arc::clone(state);
    let subscribed = store.subscribe(
        uid,
        Box::new(move |tasks| {
            lock_state(&snapshot_state).tasks = tasks.to_vec();
        }),
        Box::new(move |err| {
            warn!("event=live_snapshot module=controller status=error error={err}");
            lock_state(&error_state).error = Some(LOAD_ERROR_MESSAGE);
        }),
    );

    let mut guard = lock_state(state);
    match subscribed {
        Ok(subscription) => {
            guard.phase = Phase::Ready;
            guard.subscription = Some(subscription);
        }
        Err(err) => {
            warn!(
                "event=session_setup module=controller status=error stage=subscribe error={err}"
            );
            guard.phase = Phase::Failed;
            guard.error = Some(LOAD_ERROR_MESSAGE);
        }
    }
}

/// Session lost: dispose the subscription and reset all view state.
fn enter_signed_out(state: &Arc<Mutex<ControllerState>>) {
    let previous_sub = {
        let mut guard = lock_state(state);
        guard.session = None;
        guard.phase = Phase::SignedOut;
        guard.tasks.clear();
        guard.filter = TaskFilter::default();
        guard.selected = None;
        guard.error = None;
        guard.subscription.take()
    };
    drop(previous_sub);
    info!("event=session_cleared module=controller status=ok");
}

fn lock_state(state: &Arc<Mutex<ControllerState>>) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(|err| err.into_inner())
}
