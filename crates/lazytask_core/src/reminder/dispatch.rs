//! Alert batches and the presentation sink contract.
//!
//! # Responsibility
//! - Define the sink the scheduler hands newly crossed tasks to.
//! - Render one batched message per reminder kind.
//!
//! # Invariants
//! - Delivery is best-effort: a failed `present_batch` is never retried and
//!   never rolls back dedup state.
//! - Log lines carry counts and ids only, never task titles.

use crate::model::task::{format_due_date, Task, TaskId};
use log::{info, warn};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Which crossing a batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    DueSoon,
    Overdue,
}

impl ReminderKind {
    /// Stable wire label (`soon|overdue`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DueSoon => "soon",
            Self::Overdue => "overdue",
        }
    }
}

/// Failure reported by an alert sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Sink refused or failed to present the batch.
    Rejected(String),
    /// Sink is gone (for example the owning screen was torn down).
    Closed,
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "alert rejected: {reason}"),
            Self::Closed => write!(f, "alert sink closed"),
        }
    }
}

impl Error for DispatchError {}

/// Presentation sink for batched reminders.
pub trait AlertDispatcher {
    /// Presents one batch. `tasks` is non-empty and in snapshot order.
    fn present_batch(&self, kind: ReminderKind, tasks: &[Task]) -> Result<(), DispatchError>;
}

impl<D: AlertDispatcher + ?Sized> AlertDispatcher for Arc<D> {
    fn present_batch(&self, kind: ReminderKind, tasks: &[Task]) -> Result<(), DispatchError> {
        (**self).present_batch(kind, tasks)
    }
}

/// Rendered alert for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub kind: ReminderKind,
    pub title: String,
    pub body: String,
    pub task_ids: Vec<TaskId>,
}

impl AlertMessage {
    /// Renders a batch as a bulleted list plus a call to action.
    pub fn for_batch(kind: ReminderKind, tasks: &[Task], threshold_ms: i64) -> Self {
        let lines = tasks
            .iter()
            .map(|task| format!("• {} ({})", task.title, format_due_date(task.due_date.as_deref())))
            .collect::<Vec<_>>()
            .join("\n");

        let (title, footer) = match kind {
            ReminderKind::Overdue => (
                "Overdue tasks",
                "Mark them done or update the deadline.".to_string(),
            ),
            ReminderKind::DueSoon => (
                "Due soon",
                format!(
                    "These tasks are due within the next {} minutes.",
                    threshold_ms / 60_000
                ),
            ),
        };

        Self {
            kind,
            title: title.to_string(),
            body: format!("{lines}\n\n{footer}"),
            task_ids: tasks.iter().map(|task| task.id).collect(),
        }
    }
}

/// Sink that only records batches in the core log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertDispatcher;

impl AlertDispatcher for LogAlertDispatcher {
    fn present_batch(&self, kind: ReminderKind, tasks: &[Task]) -> Result<(), DispatchError> {
        let ids = tasks
            .iter()
            .map(|task| task.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        info!(
            "event=reminder_alert module=reminder status=presented kind={} count={} task_ids={}",
            kind.as_str(),
            tasks.len(),
            ids
        );
        Ok(())
    }
}

/// Bounded queue of rendered alerts, drained by a polling host (FFI/UI).
///
/// When full, the oldest alert is discarded.
#[derive(Debug)]
pub struct QueuedAlertDispatcher {
    threshold_ms: i64,
    capacity: usize,
    queue: Mutex<VecDeque<AlertMessage>>,
}

impl QueuedAlertDispatcher {
    pub fn new(threshold_ms: i64) -> Self {
        Self::with_capacity(threshold_ms, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(threshold_ms: i64, capacity: usize) -> Self {
        Self {
            threshold_ms,
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Window used for the "due soon" footer.
    pub fn threshold_ms(&self) -> i64 {
        self.threshold_ms
    }

    /// Removes and returns every queued alert, oldest first.
    pub fn drain(&self) -> Vec<AlertMessage> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map_or(0, |queue| queue.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertDispatcher for QueuedAlertDispatcher {
    fn present_batch(&self, kind: ReminderKind, tasks: &[Task]) -> Result<(), DispatchError> {
        let message = AlertMessage::for_batch(kind, tasks, self.threshold_ms);
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| DispatchError::Rejected("alert queue poisoned".to_string()))?;

        if queue.len() >= self.capacity {
            queue.pop_front();
            warn!(
                "event=reminder_alert module=reminder status=dropped_oldest capacity={}",
                self.capacity
            );
        }
        queue.push_back(message);
        Ok(())
    }
}
