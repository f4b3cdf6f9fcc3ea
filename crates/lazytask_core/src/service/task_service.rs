//! Task use-case service.
//!
//! # Responsibility
//! - Validate and normalize task input coming from the list screen.
//! - Provide create/toggle/reschedule/remove/list entry points.
//! - Notify change listeners after every successful write.
//!
//! # Invariants
//! - Titles are trimmed and required.
//! - Deadlines are persisted as RFC 3339 UTC text only.
//! - Listeners run after the write is committed, never on failure.

use crate::model::task::{normalize_due_input, Task, TaskId};
use crate::reminder::clock::{Clock, SystemClock};
use crate::repo::task_repo::{RepoError, TaskRepository};
use log::info;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Callback fired after each committed mutation.
pub type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// Create request from the list screen form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// Raw deadline input; empty or `None` means no deadline.
    pub due_input: Option<String>,
}

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Title is empty after trimming.
    MissingTitle,
    /// Deadline input could not be read.
    InvalidDeadline(String),
    TaskNotFound(TaskId),
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "give your task a short name"),
            Self::InvalidDeadline(value) => write!(
                f,
                "invalid deadline `{value}`; use a format like 2025-12-31 17:30 or 2025-12-31T17:30"
            ),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Use-case service over a task repository.
pub struct TaskService<R: TaskRepository> {
    repo: R,
    clock: Box<dyn Clock>,
    listeners: Vec<ChangeListener>,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            clock: Box::new(SystemClock),
            listeners: Vec::new(),
        }
    }

    /// Overrides the clock used for `created_at`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_change_listener(mut self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Creates an open task from form input.
    pub fn create_task(&self, request: &NewTask) -> TaskServiceResult<TaskId> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(TaskServiceError::MissingTitle);
        }
        let due_date = parse_due_input(request.due_input.as_deref())?;

        let mut task = Task::new(title, self.clock.now_ms());
        task.description = request.description.trim().to_string();
        task.due_date = due_date;

        let id = self.repo.create_task(&task)?;
        info!(
            "event=task_create module=service status=ok task_id={id} has_deadline={}",
            task.due_date.is_some()
        );
        self.notify_changed();
        Ok(id)
    }

    /// Flips completion and returns the updated task.
    pub fn toggle_completion(&self, id: TaskId) -> TaskServiceResult<Task> {
        let mut task = self.require_task(id)?;
        task.completed = !task.completed;
        self.repo.update_task(&task)?;
        info!(
            "event=task_toggle module=service status=ok task_id={id} completed={}",
            task.completed
        );
        self.notify_changed();
        Ok(task)
    }

    /// Replaces or clears the deadline and returns the updated task.
    pub fn set_due_date(&self, id: TaskId, due_input: Option<&str>) -> TaskServiceResult<Task> {
        let due_date = parse_due_input(due_input)?;
        let mut task = self.require_task(id)?;
        task.due_date = due_date;
        self.repo.update_task(&task)?;
        info!(
            "event=task_reschedule module=service status=ok task_id={id} has_deadline={}",
            task.due_date.is_some()
        );
        self.notify_changed();
        Ok(task)
    }

    pub fn remove_task(&self, id: TaskId) -> TaskServiceResult<()> {
        self.repo.delete_task(id)?;
        info!("event=task_delete module=service status=ok task_id={id}");
        self.notify_changed();
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> TaskServiceResult<Option<Task>> {
        Ok(self.repo.get_task(id)?)
    }

    /// Lists tasks in display order (see [`sort_tasks`]).
    pub fn list_sorted(&self) -> TaskServiceResult<Vec<Task>> {
        let mut tasks = self.repo.list_tasks()?;
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    fn require_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.repo
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }

    fn notify_changed(&self) {
        for listener in &self.listeners {
            listener();
        }
    }
}

/// Sorts tasks for the list view.
///
/// Open tasks first; then readable deadlines ascending; tasks with a
/// readable deadline before those without; remaining ties newest first.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.completed.cmp(&b.completed).then_with(|| {
            match (a.due_epoch_ms(), b.due_epoch_ms()) {
                (Some(left), Some(right)) => left.cmp(&right),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => b.created_at.cmp(&a.created_at),
            }
        })
    });
}

fn parse_due_input(raw: Option<&str>) -> TaskServiceResult<Option<String>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => normalize_due_input(value)
            .map(Some)
            .ok_or_else(|| TaskServiceError::InvalidDeadline(value.to_string())),
    }
}
