use std::sync::{Arc, Mutex};
use trailtasks_core::db::{open_db_in_memory, DbError};
use trailtasks_core::store::live::{SnapshotCallback, SnapshotHub, StoreErrorCallback};
use trailtasks_core::{
    IdentityAdapter, LocalIdentityProvider, Phase, SqliteProfileRepository, SqliteTodoStore,
    StoreError, StoreResult, Task, TaskFilter, TaskId, TodoController, TodoStore,
    TodoSubscription, UserId, ADD_ERROR_MESSAGE, DELETE_ERROR_MESSAGE, LOAD_ERROR_MESSAGE,
    PREPARE_ERROR_MESSAGE, UPDATE_ERROR_MESSAGE,
};
use uuid::Uuid;

type LocalAdapter = IdentityAdapter<LocalIdentityProvider, SqliteProfileRepository>;

fn setup() -> (LocalAdapter, TodoController) {
    let conn = Arc::new(Mutex::new(open_db_in_memory().unwrap()));
    let adapter = IdentityAdapter::new(
        LocalIdentityProvider::new(Arc::clone(&conn)),
        SqliteProfileRepository::new(Arc::clone(&conn)),
    );
    let store: Arc<dyn TodoStore + Send + Sync> = Arc::new(SqliteTodoStore::new(conn));
    let controller = TodoController::start(&adapter, store);
    (adapter, controller)
}

#[test]
fn full_session_walkthrough() {
    let (adapter, controller) = setup();
    assert_eq!(controller.phase(), Phase::SignedOut);

    let user = adapter
        .sign_up("trailblazer", "summit1", "t@example.com")
        .unwrap();
    assert_eq!(user.email, "trailblazer@trailtasks.local");
    assert_eq!(controller.phase(), Phase::Ready);

    // First snapshot holds the seeded batch, all still active.
    let seeded = controller.tasks();
    let seeded_count = seeded.len();
    assert!((8..=12).contains(&seeded_count));
    assert!(seeded.iter().all(|task| !task.completed));
    assert_eq!(controller.active_count(), seeded_count);

    // Toggling the first task flips it in the next snapshot and lowers the
    // active count by exactly one.
    let first = seeded[0].clone();
    controller.toggle(first.id);
    let after_toggle = controller.tasks();
    assert!(after_toggle[0].completed);
    assert_eq!(after_toggle[0].id, first.id);
    assert_eq!(controller.active_count(), seeded_count - 1);

    // Adding appends a fresh active task at the end of the collection.
    controller.add("Pack compass");
    let after_add = controller.tasks();
    assert_eq!(after_add.len(), seeded_count + 1);
    let appended = after_add.last().unwrap();
    assert_eq!(appended.text, "Pack compass");
    assert!(!appended.completed);

    // The completed view shows exactly the toggled task.
    controller.set_filter(TaskFilter::Completed);
    let completed_view = controller.filtered_tasks();
    assert_eq!(completed_view.len(), 1);
    assert_eq!(completed_view[0].id, first.id);

    // Clearing completed removes it and restores the pre-toggle active
    // count.
    controller.clear_completed();
    assert_eq!(controller.tasks().len(), seeded_count);
    assert_eq!(controller.active_count(), seeded_count);
    assert!(controller.filtered_tasks().is_empty());
    assert!(controller.error().is_none());
}

#[test]
fn filters_partition_the_snapshot() {
    let (adapter, controller) = setup();
    adapter
        .sign_up("partition", "summit1", "p@example.com")
        .unwrap();

    let tasks = controller.tasks();
    controller.toggle(tasks[1].id);
    controller.toggle(tasks[3].id);

    controller.set_filter(TaskFilter::All);
    let all = controller.filtered_tasks();
    controller.set_filter(TaskFilter::Active);
    let active = controller.filtered_tasks();
    controller.set_filter(TaskFilter::Completed);
    let completed = controller.filtered_tasks();

    assert_eq!(all.len(), active.len() + completed.len());
    assert!(active.iter().all(|task| !task.completed));
    assert!(completed.iter().all(|task| task.completed));
    assert_eq!(controller.active_count(), active.len());
}

#[test]
fn sign_out_resets_all_view_state() {
    let (adapter, controller) = setup();
    adapter
        .sign_up("resetter", "summit1", "r@example.com")
        .unwrap();

    let tasks = controller.tasks();
    controller.set_filter(TaskFilter::Completed);
    controller.select(Some(tasks[0].id));
    assert!(controller.session().is_some());

    adapter.sign_out();

    assert_eq!(controller.phase(), Phase::SignedOut);
    assert!(controller.session().is_none());
    assert!(controller.tasks().is_empty());
    assert_eq!(controller.filter(), TaskFilter::All);
    assert_eq!(controller.selected(), None);
    assert!(controller.error().is_none());
}

#[test]
fn returning_user_is_not_reseeded() {
    let (adapter, controller) = setup();
    adapter
        .sign_up("returning", "summit1", "r@example.com")
        .unwrap();
    let seeded_count = controller.tasks().len();

    adapter.sign_out();
    adapter.sign_in("returning", "summit1").unwrap();

    assert_eq!(controller.phase(), Phase::Ready);
    assert_eq!(controller.tasks().len(), seeded_count);
}

#[test]
fn controller_started_after_sign_in_catches_up_immediately() {
    let conn = Arc::new(Mutex::new(open_db_in_memory().unwrap()));
    let adapter = IdentityAdapter::new(
        LocalIdentityProvider::new(Arc::clone(&conn)),
        SqliteProfileRepository::new(Arc::clone(&conn)),
    );
    let store: Arc<dyn TodoStore + Send + Sync> = Arc::new(SqliteTodoStore::new(conn));

    adapter
        .sign_up("earlybird", "summit1", "e@example.com")
        .unwrap();

    // The session watch fires on registration, so mounting after sign-in
    // still seeds and subscribes before `start` returns.
    let controller = TodoController::start(&adapter, store);
    assert_eq!(controller.phase(), Phase::Ready);
    assert!((8..=12).contains(&controller.tasks().len()));
}

#[test]
fn keyboard_shortcut_toggles_the_selected_task_regardless_of_filter() {
    let (adapter, controller) = setup();
    adapter
        .sign_up("shortcuts", "summit1", "s@example.com")
        .unwrap();

    let target = controller.tasks()[2].clone();
    controller.set_filter(TaskFilter::Completed); // target not visible
    controller.select(Some(target.id));

    controller.toggle_selected();
    let toggled = controller
        .tasks()
        .into_iter()
        .find(|task| task.id == target.id)
        .unwrap();
    assert!(toggled.completed);

    // No selection means the shortcut is a no-op.
    controller.select(None);
    controller.toggle_selected();
    assert_eq!(
        controller
            .tasks()
            .iter()
            .filter(|task| task.completed)
            .count(),
        1
    );
}

#[test]
fn blank_input_and_stale_ids_are_silent_no_ops() {
    let (adapter, controller) = setup();
    adapter
        .sign_up("noop", "summit1", "n@example.com")
        .unwrap();
    let count = controller.tasks().len();

    controller.add("   ");
    controller.toggle(Uuid::new_v4()); // not in the snapshot

    assert_eq!(controller.tasks().len(), count);
    assert!(controller.error().is_none());
}

// ---------------------------------------------------------------------
// Failure-path coverage with a scripted store.
// ---------------------------------------------------------------------

struct StubStore {
    hub: SnapshotHub,
    has_tasks: bool,
    fail_mutations: bool,
    fail_subscribe: bool,
}

impl StubStore {
    fn new(has_tasks: bool, fail_mutations: bool, fail_subscribe: bool) -> Self {
        Self {
            hub: SnapshotHub::new(),
            has_tasks,
            fail_mutations,
            fail_subscribe,
        }
    }

    fn mutation_result(&self) -> StoreResult<()> {
        if self.fail_mutations {
            Err(transport_failure())
        } else {
            Ok(())
        }
    }
}

fn transport_failure() -> StoreError {
    StoreError::Db(DbError::Sqlite(rusqlite::Error::InvalidQuery))
}

impl TodoStore for StubStore {
    fn add(&self, _uid: UserId, _text: &str) -> StoreResult<TaskId> {
        // Acknowledged writes deliberately push no snapshot: the visible
        // list must only ever change through subscription delivery.
        self.mutation_result().map(|()| Uuid::new_v4())
    }

    fn add_seeded(&self, _uid: UserId, _text: &str, _order: i64) -> StoreResult<TaskId> {
        self.mutation_result().map(|()| Uuid::new_v4())
    }

    fn toggle(&self, _uid: UserId, _id: TaskId, _completed: bool) -> StoreResult<()> {
        self.mutation_result()
    }

    fn delete(&self, _uid: UserId, _id: TaskId) -> StoreResult<()> {
        self.mutation_result()
    }

    fn has_any(&self, _uid: UserId) -> StoreResult<bool> {
        Ok(self.has_tasks)
    }

    fn clear_completed(&self, _uid: UserId) -> StoreResult<usize> {
        self.mutation_result().map(|()| 0)
    }

    fn subscribe(
        &self,
        uid: UserId,
        mut on_snapshot: SnapshotCallback,
        on_error: StoreErrorCallback,
    ) -> StoreResult<TodoSubscription> {
        if self.fail_subscribe {
            return Err(transport_failure());
        }
        on_snapshot(&[]);
        Ok(self.hub.subscribe(uid, on_snapshot, on_error))
    }
}

fn setup_with_stub(stub: Arc<StubStore>) -> (LocalAdapter, TodoController) {
    let conn = Arc::new(Mutex::new(open_db_in_memory().unwrap()));
    let adapter = IdentityAdapter::new(
        LocalIdentityProvider::new(Arc::clone(&conn)),
        SqliteProfileRepository::new(conn),
    );
    let store: Arc<dyn TodoStore + Send + Sync> = stub;
    let controller = TodoController::start(&adapter, store);
    (adapter, controller)
}

#[test]
fn seeding_failure_ends_loading_with_the_prepare_error() {
    let stub = Arc::new(StubStore::new(false, true, false));
    let (adapter, controller) = setup_with_stub(stub);

    adapter
        .sign_up("unlucky", "summit1", "u@example.com")
        .unwrap();

    assert_eq!(controller.phase(), Phase::Failed);
    assert_eq!(controller.error(), Some(PREPARE_ERROR_MESSAGE));
    assert!(controller.session().is_some(), "session is retained");
    assert!(controller.tasks().is_empty());
}

#[test]
fn subscription_failure_ends_loading_with_the_load_error() {
    let stub = Arc::new(StubStore::new(true, false, true));
    let (adapter, controller) = setup_with_stub(stub);

    adapter
        .sign_up("unlucky", "summit1", "u@example.com")
        .unwrap();

    assert_eq!(controller.phase(), Phase::Failed);
    assert_eq!(controller.error(), Some(LOAD_ERROR_MESSAGE));
}

#[test]
fn each_action_maps_its_failure_to_its_own_sentence() {
    let stub = Arc::new(StubStore::new(true, true, false));
    let (adapter, controller) = setup_with_stub(Arc::clone(&stub));

    let user = adapter
        .sign_up("unlucky", "summit1", "u@example.com")
        .unwrap();
    assert_eq!(controller.phase(), Phase::Ready);

    controller.add("doomed");
    assert_eq!(controller.error(), Some(ADD_ERROR_MESSAGE));
    controller.clear_error();

    // Push a snapshot through the stub hub so toggle finds its target.
    let task = Task {
        id: Uuid::new_v4(),
        text: "snapshotted".to_string(),
        completed: false,
        created_at_ms: 1,
        order: None,
    };
    stub.hub.publish(user.uid, std::slice::from_ref(&task));
    assert_eq!(controller.tasks().len(), 1);

    controller.toggle(task.id);
    assert_eq!(controller.error(), Some(UPDATE_ERROR_MESSAGE));
    controller.clear_error();

    controller.delete(task.id);
    assert_eq!(controller.error(), Some(DELETE_ERROR_MESSAGE));
    controller.clear_error();

    controller.clear_completed();
    assert_eq!(controller.error(), Some(DELETE_ERROR_MESSAGE));

    // Failures never mutate the mirrored snapshot.
    assert_eq!(controller.tasks().len(), 1);
}

#[test]
fn acknowledged_writes_do_not_update_the_list_optimistically() {
    let stub = Arc::new(StubStore::new(true, false, false));
    let (adapter, controller) = setup_with_stub(stub);

    adapter
        .sign_up("patient", "summit1", "p@example.com")
        .unwrap();
    assert_eq!(controller.phase(), Phase::Ready);

    controller.add("accepted but not yet echoed");
    assert!(controller.error().is_none());
    assert!(
        controller.tasks().is_empty(),
        "list changes only when a snapshot arrives"
    );
}
