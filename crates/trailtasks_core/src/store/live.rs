//! In-process live-query hub for todo snapshots.
//!
//! # Responsibility
//! - Track per-user snapshot subscribers and fan out full ordered views.
//! - Hand out disposers that terminate delivery exactly once.
//!
//! # Invariants
//! - Callbacks are invoked without the registry lock held, so a callback
//!   may re-enter the store (and thus this hub) safely.
//! - A cancelled subscription never observes another snapshot, even when
//!   cancellation happens inside an in-flight dispatch.
//! - Snapshots carry the complete ordered collection, never deltas.

use crate::model::task::Task;
use crate::model::user::UserId;
use crate::store::StoreError;
use log::debug;
use std::sync::{Arc, Mutex, Weak};

pub type SnapshotCallback = Box<dyn FnMut(&[Task]) + Send>;
pub type StoreErrorCallback = Box<dyn FnMut(&StoreError) + Send>;

struct Subscriber {
    id: u64,
    uid: UserId,
    on_snapshot: SnapshotCallback,
    on_error: StoreErrorCallback,
}

#[derive(Default)]
struct HubInner {
    subscribers: Vec<Subscriber>,
    /// Ids cancelled while their subscriber was checked out by a dispatch.
    retired: Vec<u64>,
    next_id: u64,
}

/// Per-user snapshot fan-out registry.
#[derive(Default)]
pub struct SnapshotHub {
    inner: Arc<Mutex<HubInner>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for one user's collection.
    ///
    /// The initial snapshot is delivered by the caller (the store adapter),
    /// not by this registry.
    pub fn subscribe(
        &self,
        uid: UserId,
        on_snapshot: SnapshotCallback,
        on_error: StoreErrorCallback,
    ) -> TodoSubscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            uid,
            on_snapshot,
            on_error,
        });
        debug!("event=live_subscribe module=store status=ok subscription_id={id}");
        TodoSubscription {
            inner: Arc::downgrade(&self.inner),
            id,
            active: true,
        }
    }

    /// Delivers a fresh full snapshot to every subscriber of `uid`.
    pub fn publish(&self, uid: UserId, tasks: &[Task]) {
        self.dispatch(uid, |subscriber| (subscriber.on_snapshot)(tasks));
    }

    /// Delivers a transport/permission failure to every subscriber of `uid`.
    pub fn publish_error(&self, uid: UserId, error: &StoreError) {
        self.dispatch(uid, |subscriber| (subscriber.on_error)(error));
    }

    /// Returns the number of live subscriptions (all users).
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn dispatch(&self, uid: UserId, mut deliver: impl FnMut(&mut Subscriber)) {
        // Check subscribers out of the lock so callbacks can re-enter.
        let mut checked_out = {
            let mut inner = self.lock();
            std::mem::take(&mut inner.subscribers)
        };

        for subscriber in checked_out.iter_mut().filter(|s| s.uid == uid) {
            // A callback earlier in this pass may have cancelled this one;
            // retired ids are skipped, not just dropped at re-merge.
            if self.lock().retired.contains(&subscriber.id) {
                continue;
            }
            deliver(subscriber);
        }

        let mut inner = self.lock();
        // Subscribers registered during delivery were pushed onto the inner
        // list; keep them behind the checked-out ones.
        let added = std::mem::replace(&mut inner.subscribers, checked_out);
        inner.subscribers.extend(added);

        let retired = std::mem::take(&mut inner.retired);
        if !retired.is_empty() {
            inner.subscribers.retain(|s| !retired.contains(&s.id));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Disposer for one live subscription.
///
/// Cancels on explicit `cancel()` or on drop; both paths are idempotent.
pub struct TodoSubscription {
    inner: Weak<Mutex<HubInner>>,
    id: u64,
    active: bool,
}

impl TodoSubscription {
    /// Terminates the live query. Safe to call more than once.
    pub fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(|err| err.into_inner());
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != self.id);
        if inner.subscribers.len() == before {
            // Checked out by an in-flight dispatch; retire on re-merge.
            inner.retired.push(self.id);
        }
        debug!(
            "event=live_unsubscribe module=store status=ok subscription_id={}",
            self.id
        );
    }

    /// Returns whether the subscription still delivers snapshots.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TodoSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
