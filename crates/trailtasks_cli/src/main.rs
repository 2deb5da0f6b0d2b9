//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `trailtasks_core` wiring.
//! - Walk one in-memory sign-up/seed/toggle session for local sanity
//!   checks.

use std::sync::{Arc, Mutex};
use trailtasks_core::db::open_db_in_memory;
use trailtasks_core::{
    default_log_level, init_logging, sign_up_error_message, IdentityAdapter,
    LocalIdentityProvider, SqliteProfileRepository, SqliteTodoStore, TaskFilter, TodoController,
    TodoStore,
};

/// Starts file logging under the OS temp directory.
///
/// Returns the directory handed to the logging bootstrap.
fn bootstrap_logging() -> Result<String, String> {
    let log_dir = std::env::temp_dir().join("trailtasks-logs");
    let log_dir = log_dir
        .to_str()
        .ok_or_else(|| "log directory path is not valid UTF-8".to_string())?
        .to_string();
    init_logging(default_log_level(), &log_dir)?;
    Ok(log_dir)
}

fn main() {
    match bootstrap_logging() {
        Ok(log_dir) => println!("logging to {log_dir}"),
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    println!("trailtasks_core version={}", trailtasks_core::core_version());

    let conn = match open_db_in_memory() {
        Ok(conn) => Arc::new(Mutex::new(conn)),
        Err(err) => {
            eprintln!("failed to open in-memory store: {err}");
            std::process::exit(1);
        }
    };

    let identity = IdentityAdapter::new(
        LocalIdentityProvider::new(Arc::clone(&conn)),
        SqliteProfileRepository::new(Arc::clone(&conn)),
    );
    let store: Arc<dyn TodoStore + Send + Sync> = Arc::new(SqliteTodoStore::new(conn));
    let controller = TodoController::start(&identity, Arc::clone(&store));

    if let Err(err) = identity.sign_up("trailblazer", "summit1", "t@example.com") {
        eprintln!("sign-up failed: {}", sign_up_error_message(&err));
        std::process::exit(1);
    }

    let seeded = controller.tasks();
    println!("seeded tasks={}", seeded.len());

    if let Some(first) = seeded.first() {
        controller.toggle(first.id);
    }
    controller.add("Pack compass");
    controller.set_filter(TaskFilter::Active);

    println!(
        "phase={:?} total={} active={} visible={}",
        controller.phase(),
        controller.tasks().len(),
        controller.active_count(),
        controller.filtered_tasks().len()
    );

    identity.sign_out();
    println!("signed out; phase={:?}", controller.phase());
}

#[cfg(test)]
mod tests {
    use super::bootstrap_logging;
    use std::path::PathBuf;
    use trailtasks_core::logging_status;

    #[test]
    fn entry_point_activates_logging() {
        let log_dir = bootstrap_logging().expect("bootstrap should succeed");
        let repeat = bootstrap_logging().expect("bootstrap should stay idempotent");
        assert_eq!(log_dir, repeat);

        let (_, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_dir, PathBuf::from(log_dir));
    }
}
