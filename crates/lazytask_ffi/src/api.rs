//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose task list and deadline reminder use-cases to Dart via FRB.
//! - Own the process-wide reminder session (runtime, lifecycle channel,
//!   alert queue) so the UI only sends events and polls alerts.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - At most one reminder session is active per process.
//! - Every successful task mutation notifies the active session.

use lazytask_core::db::open_db;
use lazytask_core::{
    core_version as core_version_inner, format_due_date, init_logging as init_logging_inner,
    ping as ping_inner, AlertMessage, AppLifecycle, Clock, DueBadge, NewTask, QueuedAlertDispatcher,
    ReminderConfig, ReminderHandle, ReminderRuntime, ReminderScheduler, SqliteTaskRepository,
    SqliteTaskSource, SystemClock, Task, TaskId, TaskService, TaskServiceResult,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

const TASK_DB_FILE_NAME: &str = "lazytask.sqlite3";
const REMINDER_WORKER_THREADS: usize = 1;

static TASK_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static REMINDER_RUNTIME: OnceLock<Runtime> = OnceLock::new();
static REMINDER_SESSION: Mutex<Option<ReminderSession>> = Mutex::new(None);

struct ReminderSession {
    handle: ReminderHandle,
    lifecycle: watch::Sender<AppLifecycle>,
    alerts: Arc<QueuedAlertDispatcher>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Task row projected for the list screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub task_id: String,
    pub title: String,
    pub description: String,
    /// Persisted RFC 3339 deadline, if any.
    pub due_date: Option<String>,
    /// Local `YYYY-MM-DD HH:MM`, `No deadline` or `Unknown deadline`.
    pub due_label: String,
    /// Urgency marker (`overdue|soon|deadline|none`).
    pub badge: String,
    pub completed: bool,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    /// Tasks in display order.
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Generic action response envelope for task and reminder commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Task ID touched by the command, when there is one.
    pub task_id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, task_id: Option<String>) -> Self {
        Self {
            ok: true,
            task_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            message: message.into(),
        }
    }
}

/// One batched reminder ready to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderAlert {
    /// `overdue` or `soon`.
    pub kind: String,
    pub title: String,
    pub body: String,
    pub task_ids: Vec<String>,
}

/// Creates a task from the list screen form.
///
/// `due_input` accepts `YYYY-MM-DD HH:mm`, `YYYY-MM-DDTHH:mm` (local time)
/// or RFC 3339; empty means no deadline.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn task_create(title: String, description: String, due_input: Option<String>) -> ActionResponse {
    let request = NewTask {
        title,
        description,
        due_input,
    };
    match with_task_service(|service| service.create_task(&request)) {
        Ok(task_id) => ActionResponse::success("Task created.", Some(task_id.to_string())),
        Err(err) => ActionResponse::failure(format!("task_create failed: {err}")),
    }
}

/// Flips completion of one task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_toggle(task_id: String) -> ActionResponse {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(message) => return ActionResponse::failure(message),
    };
    match with_task_service(|service| service.toggle_completion(id)) {
        Ok(task) => {
            let message = if task.completed {
                "Task completed."
            } else {
                "Task reopened."
            };
            ActionResponse::success(message, Some(task.id.to_string()))
        }
        Err(err) => ActionResponse::failure(format!("task_toggle failed: {err}")),
    }
}

/// Removes one task permanently.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(task_id: String) -> ActionResponse {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(message) => return ActionResponse::failure(message),
    };
    match with_task_service(|service| service.remove_task(id)) {
        Ok(()) => ActionResponse::success("Task deleted.", Some(id.to_string())),
        Err(err) => ActionResponse::failure(format!("task_delete failed: {err}")),
    }
}

/// Lists tasks in display order with precomputed badges.
#[flutter_rust_bridge::frb(sync)]
pub fn task_list() -> TaskListResponse {
    let threshold_ms = active_threshold_ms();
    let now_ms = SystemClock.now_ms();

    match with_task_service(|service| service.list_sorted()) {
        Ok(tasks) => {
            let items = tasks
                .iter()
                .map(|task| to_task_item(task, now_ms, threshold_ms))
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No tasks yet.".to_string()
            } else {
                format!("{} task(s).", items.len())
            };
            TaskListResponse { items, message }
        }
        Err(err) => TaskListResponse {
            items: Vec::new(),
            message: format!("task_list failed: {err}"),
        },
    }
}

/// Starts the reminder session for the task database.
///
/// `threshold_minutes` overrides the 60 minute "due soon" window.
///
/// # FFI contract
/// - Runs the first evaluation pass before returning.
/// - Fails when a session is already running.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_start(threshold_minutes: Option<u32>) -> ActionResponse {
    let mut config = ReminderConfig::default();
    if let Some(minutes) = threshold_minutes {
        config.threshold_ms = i64::from(minutes) * 60_000;
    }
    if let Err(err) = config.validate() {
        return ActionResponse::failure(format!("reminder_start failed: {err}"));
    }

    let mut session = lock_session();
    if session.is_some() {
        return ActionResponse::failure("reminder_start failed: reminders already running");
    }

    let runtime = match reminder_runtime() {
        Ok(runtime) => runtime,
        Err(err) => return ActionResponse::failure(format!("reminder_start failed: {err}")),
    };

    let alerts = Arc::new(QueuedAlertDispatcher::new(config.threshold_ms));
    let scheduler = ReminderScheduler::new(
        SqliteTaskSource::new(resolve_task_db_path()),
        Arc::clone(&alerts),
        SystemClock,
        config,
    );
    let (lifecycle, lifecycle_rx) = watch::channel(AppLifecycle::Active);

    match ReminderRuntime::spawn(runtime.handle(), scheduler, Some(lifecycle_rx)) {
        Ok(handle) => {
            *session = Some(ReminderSession {
                handle,
                lifecycle,
                alerts,
            });
            info!(
                "event=ffi_reminder_start module=ffi status=ok threshold_ms={}",
                config.threshold_ms
            );
            ActionResponse::success("Reminders started.", None)
        }
        Err(err) => ActionResponse::failure(format!("reminder_start failed: {err}")),
    }
}

/// Stops the reminder session and waits for its loop to exit.
///
/// Idempotent: stopping without a session succeeds.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_stop() -> ActionResponse {
    let Some(mut session) = lock_session().take() else {
        return ActionResponse::success("Reminders not running.", None);
    };
    match REMINDER_RUNTIME.get() {
        Some(runtime) => runtime.block_on(session.handle.stop()),
        None => warn!("event=ffi_reminder_stop module=ffi status=error error_code=runtime_missing"),
    }
    info!("event=ffi_reminder_stop module=ffi status=ok");
    ActionResponse::success("Reminders stopped.", None)
}

/// Signals that the task list screen became visible.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_focus_gained() -> ActionResponse {
    match lock_session().as_ref() {
        Some(session) => {
            session.handle.trigger().focus_gained();
            ActionResponse::success("Evaluation requested.", None)
        }
        None => ActionResponse::failure("reminder_focus_gained failed: reminders not running"),
    }
}

/// Forwards a Flutter `AppLifecycleState` name (`resumed|inactive|hidden|
/// paused|detached`); returning to `resumed` triggers an evaluation.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_app_state_changed(state: String) -> ActionResponse {
    let Some(lifecycle) = parse_app_lifecycle(&state) else {
        return ActionResponse::failure(format!(
            "reminder_app_state_changed failed: unsupported state `{}`",
            state.trim()
        ));
    };
    match lock_session().as_ref() {
        Some(session) => {
            session.lifecycle.send_if_modified(|current| {
                if *current == lifecycle {
                    return false;
                }
                *current = lifecycle;
                true
            });
            ActionResponse::success("App state recorded.", None)
        }
        None => ActionResponse::failure("reminder_app_state_changed failed: reminders not running"),
    }
}

/// Drains alerts produced since the last call, oldest first.
///
/// Returns an empty list when no session is running.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_drain_alerts() -> Vec<ReminderAlert> {
    let alerts = match lock_session().as_ref() {
        Some(session) => Arc::clone(&session.alerts),
        None => return Vec::new(),
    };
    alerts.drain().into_iter().map(to_reminder_alert).collect()
}

fn lock_session() -> MutexGuard<'static, Option<ReminderSession>> {
    REMINDER_SESSION
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn reminder_runtime() -> Result<&'static Runtime, String> {
    if let Some(runtime) = REMINDER_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Builder::new_multi_thread()
        .worker_threads(REMINDER_WORKER_THREADS)
        .thread_name("lazytask-reminder")
        .enable_time()
        .build()
        .map_err(|err| format!("reminder runtime init failed: {err}"))?;
    // Callers hold the session lock, so only one runtime is ever built.
    Ok(REMINDER_RUNTIME.get_or_init(|| runtime))
}

fn active_threshold_ms() -> i64 {
    lock_session()
        .as_ref()
        .map_or(ReminderConfig::default().threshold_ms, |session| {
            session.alerts.threshold_ms()
        })
}

fn notify_tasks_mutated() {
    if let Some(session) = lock_session().as_ref() {
        session.handle.trigger().tasks_mutated();
    }
}

fn resolve_task_db_path() -> PathBuf {
    TASK_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("LAZYTASK_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(TASK_DB_FILE_NAME)
        })
        .clone()
}

fn with_task_service<T>(
    f: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> TaskServiceResult<T>,
) -> Result<T, String> {
    let db_path = resolve_task_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("task DB open failed: {err}"))?;
    let service =
        TaskService::new(SqliteTaskRepository::new(&conn)).with_change_listener(notify_tasks_mutated);
    f(&service).map_err(|err| err.to_string())
}

fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::parse_str(raw.trim()).map_err(|_| format!("invalid task id `{}`", raw.trim()))
}

fn parse_app_lifecycle(raw: &str) -> Option<AppLifecycle> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "resumed" | "active" => Some(AppLifecycle::Active),
        "inactive" | "hidden" => Some(AppLifecycle::Inactive),
        "paused" | "detached" | "background" => Some(AppLifecycle::Background),
        _ => None,
    }
}

fn to_task_item(task: &Task, now_ms: i64, threshold_ms: i64) -> TaskItem {
    TaskItem {
        task_id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        due_date: task.due_date.clone(),
        due_label: format_due_date(task.due_date.as_deref()),
        badge: badge_label(task.badge(now_ms, threshold_ms)).to_string(),
        completed: task.completed,
    }
}

fn badge_label(badge: DueBadge) -> &'static str {
    match badge {
        DueBadge::Overdue => "overdue",
        DueBadge::DueSoon => "soon",
        DueBadge::Deadline => "deadline",
        DueBadge::None => "none",
    }
}

fn to_reminder_alert(message: AlertMessage) -> ReminderAlert {
    ReminderAlert {
        kind: message.kind.as_str().to_string(),
        title: message.title,
        body: message.body,
        task_ids: message.task_ids.iter().map(ToString::to_string).collect(),
    }
}
