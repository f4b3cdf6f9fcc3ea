//! Core domain logic for LazyTask.
//! This crate is the single source of truth for task and reminder invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod reminder;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::task::{
    format_due_date, normalize_due_input, parse_due_date, DueBadge, Task, TaskId,
    TaskValidationError,
};
pub use reminder::{
    AlertDispatcher, AlertMessage, AppLifecycle, Clock, ConfigError, DispatchError,
    EvaluationError, LifecycleError, LogAlertDispatcher, PassReport, QueuedAlertDispatcher,
    ReminderConfig, ReminderHandle, ReminderKind, ReminderRuntime, ReminderScheduler,
    ReminderTrigger, SchedulerState, SnapshotError, SpawnError, SqliteTaskSource, SystemClock,
    TaskSnapshotSource, TriggerSource,
};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskRepository};
pub use service::task_service::{
    sort_tasks, NewTask, TaskService, TaskServiceError, TaskServiceResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
