use std::sync::{Arc, Mutex};
use trailtasks_core::db::{open_db, open_db_in_memory};
use trailtasks_core::store::live::SnapshotHub;
use trailtasks_core::{SqliteTodoStore, StoreError, Task, TodoStore, TodoSubscription};
use uuid::Uuid;

fn new_store() -> SqliteTodoStore {
    let conn = Arc::new(Mutex::new(open_db_in_memory().unwrap()));
    SqliteTodoStore::new(conn)
}

/// Subscribes and collects every delivered snapshot.
fn capture_snapshots(
    store: &SqliteTodoStore,
    uid: Uuid,
) -> (
    Arc<Mutex<Vec<Vec<Task>>>>,
    trailtasks_core::TodoSubscription,
) {
    let snapshots: Arc<Mutex<Vec<Vec<Task>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    let subscription = store
        .subscribe(
            uid,
            Box::new(move |tasks| sink.lock().unwrap().push(tasks.to_vec())),
            Box::new(|_err| {}),
        )
        .unwrap();
    (snapshots, subscription)
}

fn latest(snapshots: &Arc<Mutex<Vec<Vec<Task>>>>) -> Vec<Task> {
    snapshots.lock().unwrap().last().cloned().unwrap()
}

#[test]
fn add_trims_text_and_defaults_to_not_completed() {
    let store = new_store();
    let uid = Uuid::new_v4();

    let id = store.add(uid, "  Pack compass  ").unwrap();
    let (snapshots, _sub) = capture_snapshots(&store, uid);

    let tasks = latest(&snapshots);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
    assert_eq!(tasks[0].text, "Pack compass");
    assert!(!tasks[0].completed);
    assert_eq!(tasks[0].order, None);
}

#[test]
fn add_rejects_blank_text() {
    let store = new_store();
    let err = store.add(Uuid::new_v4(), "   ").unwrap_err();
    assert!(matches!(err, StoreError::EmptyText));
}

#[test]
fn snapshots_keep_insertion_order() {
    let store = new_store();
    let uid = Uuid::new_v4();

    let first = store.add(uid, "first").unwrap();
    let second = store.add(uid, "second").unwrap();
    let third = store.add(uid, "third").unwrap();

    let (snapshots, _sub) = capture_snapshots(&store, uid);
    let ids: Vec<_> = latest(&snapshots).iter().map(|task| task.id).collect();
    assert_eq!(ids, vec![first, second, third]);
}

#[test]
fn subscribe_delivers_initial_snapshot_then_one_per_mutation() {
    let store = new_store();
    let uid = Uuid::new_v4();
    store.add(uid, "existing").unwrap();

    let (snapshots, mut subscription) = capture_snapshots(&store, uid);
    assert_eq!(snapshots.lock().unwrap().len(), 1, "initial snapshot");

    let id = store.add(uid, "another").unwrap();
    store.toggle(uid, id, true).unwrap();
    store.delete(uid, id).unwrap();
    assert_eq!(snapshots.lock().unwrap().len(), 4);

    subscription.cancel();
    assert!(!subscription.is_active());
    subscription.cancel(); // disposer is idempotent

    store.add(uid, "after cancel").unwrap();
    assert_eq!(
        snapshots.lock().unwrap().len(),
        4,
        "no delivery after cancel"
    );
}

#[test]
fn toggle_flips_only_the_target_task() {
    let store = new_store();
    let uid = Uuid::new_v4();

    let target = store.add(uid, "toggle me").unwrap();
    store.add(uid, "leave me").unwrap();

    let (snapshots, _sub) = capture_snapshots(&store, uid);
    let before = latest(&snapshots);

    store.toggle(uid, target, true).unwrap();
    let after = latest(&snapshots);

    assert_eq!(before.len(), after.len());
    for (old, new) in before.iter().zip(after.iter()) {
        if old.id == target {
            assert!(!old.completed);
            assert!(new.completed);
            assert_eq!(old.text, new.text);
            assert_eq!(old.created_at_ms, new.created_at_ms);
            assert_eq!(old.order, new.order);
        } else {
            assert_eq!(old, new);
        }
    }
}

#[test]
fn toggle_and_delete_report_missing_tasks() {
    let store = new_store();
    let uid = Uuid::new_v4();
    let missing = Uuid::new_v4();

    assert!(matches!(
        store.toggle(uid, missing, true).unwrap_err(),
        StoreError::NotFound(id) if id == missing
    ));
    assert!(matches!(
        store.delete(uid, missing).unwrap_err(),
        StoreError::NotFound(id) if id == missing
    ));
}

#[test]
fn collections_are_scoped_per_user() {
    let store = new_store();
    let hiker = Uuid::new_v4();
    let other = Uuid::new_v4();

    let hiker_task = store.add(hiker, "hiker task").unwrap();
    store.add(other, "other task").unwrap();

    let (hiker_snapshots, _hiker_sub) = capture_snapshots(&store, hiker);
    let (other_snapshots, _other_sub) = capture_snapshots(&store, other);

    // A mutation in one collection is invisible to the other subscriber.
    store.delete(hiker, hiker_task).unwrap();
    assert!(latest(&hiker_snapshots).is_empty());
    assert_eq!(other_snapshots.lock().unwrap().len(), 1);
    assert_eq!(latest(&other_snapshots).len(), 1);

    // Deleting by id never crosses user boundaries.
    let stray = store.add(other, "stray").unwrap();
    assert!(matches!(
        store.delete(hiker, stray).unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert_eq!(latest(&other_snapshots).len(), 2);
}

#[test]
fn clear_completed_deletes_exactly_the_completed_subset() {
    let store = new_store();
    let uid = Uuid::new_v4();

    let done_a = store.add(uid, "done a").unwrap();
    let open_b = store.add(uid, "open b").unwrap();
    let done_c = store.add(uid, "done c").unwrap();
    store.toggle(uid, done_a, true).unwrap();
    store.toggle(uid, done_c, true).unwrap();

    let deleted = store.clear_completed(uid).unwrap();
    assert_eq!(deleted, 2);

    let (snapshots, _sub) = capture_snapshots(&store, uid);
    let remaining = latest(&snapshots);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, open_b);

    // Nothing left to clear.
    assert_eq!(store.clear_completed(uid).unwrap(), 0);
}

#[test]
fn cancelling_a_sibling_mid_dispatch_suppresses_its_delivery() {
    let hub = SnapshotHub::new();
    let uid = Uuid::new_v4();

    let victim_slot: Arc<Mutex<Option<TodoSubscription>>> = Arc::new(Mutex::new(None));
    let victim_deliveries = Arc::new(Mutex::new(0usize));

    // First subscriber in dispatch order; its callback cancels the second.
    let slot = Arc::clone(&victim_slot);
    let _canceller = hub.subscribe(
        uid,
        Box::new(move |_tasks| {
            if let Some(mut victim) = slot.lock().unwrap().take() {
                victim.cancel();
            }
        }),
        Box::new(|_err| {}),
    );

    let deliveries = Arc::clone(&victim_deliveries);
    let victim = hub.subscribe(
        uid,
        Box::new(move |_tasks| *deliveries.lock().unwrap() += 1),
        Box::new(|_err| {}),
    );
    *victim_slot.lock().unwrap() = Some(victim);

    hub.publish(uid, &[]);
    assert_eq!(
        *victim_deliveries.lock().unwrap(),
        0,
        "cancelled before its turn in the same pass"
    );
    assert_eq!(hub.subscriber_count(), 1);

    hub.publish(uid, &[]);
    assert_eq!(*victim_deliveries.lock().unwrap(), 0);
}

#[test]
fn has_any_is_a_bounded_existence_probe() {
    let store = new_store();
    let uid = Uuid::new_v4();

    assert!(!store.has_any(uid).unwrap());
    store.add(uid, "one").unwrap();
    assert!(store.has_any(uid).unwrap());
    assert!(!store.has_any(Uuid::new_v4()).unwrap());
}

#[test]
fn file_backed_store_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trailtasks.sqlite3");
    let uid = Uuid::new_v4();

    {
        let conn = Arc::new(Mutex::new(open_db(&path).unwrap()));
        let store = SqliteTodoStore::new(conn);
        store.add(uid, "persisted").unwrap();
    }

    let conn = Arc::new(Mutex::new(open_db(&path).unwrap()));
    let store = SqliteTodoStore::new(conn);
    let (snapshots, _sub) = capture_snapshots(&store, uid);
    let tasks = latest(&snapshots);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "persisted");
}

#[test]
fn migrations_leave_a_supported_schema_version() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, trailtasks_core::db::migrations::latest_version());
}
