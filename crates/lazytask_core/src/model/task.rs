//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by the list view and reminders.
//! - Own due-date parsing, normalization and display formatting.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `title` is non-empty after trimming.
//! - `due_date` is stored as text; a value that fails to parse is a data
//!   error of the store and is never classified, but is not rejected on read.

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every task.
pub type TaskId = Uuid;

const NAIVE_INPUT_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Free-form details; display only.
    pub description: String,
    /// RFC 3339 deadline text. `None` means "no deadline".
    pub due_date: Option<String>,
    pub completed: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Validation failures for task write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title cannot be empty"),
        }
    }
}

impl Error for TaskValidationError {}

/// Visual urgency marker for a task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueBadge {
    Overdue,
    DueSoon,
    /// Has a deadline outside the soon window.
    Deadline,
    /// No deadline, or the stored value is unreadable.
    None,
}

impl Task {
    /// Creates an open task with a generated ID and no deadline.
    pub fn new(title: impl Into<String>, created_at: i64) -> Self {
        Self::with_id(Uuid::new_v4(), title, created_at)
    }

    /// Creates an open task with a caller-provided stable ID.
    pub fn with_id(id: TaskId, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            due_date: None,
            completed: false,
            created_at,
        }
    }

    /// Builder-style helper for setting a deadline at epoch milliseconds.
    pub fn due_at(mut self, due_epoch_ms: i64) -> Self {
        self.due_date = format_rfc3339(due_epoch_ms);
        self
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Parsed deadline in epoch milliseconds.
    ///
    /// Returns `None` both for "no deadline" and for malformed text.
    pub fn due_epoch_ms(&self) -> Option<i64> {
        self.due_date.as_deref().and_then(parse_due_date)
    }

    /// Whether the task takes part in deadline tracking at all.
    ///
    /// Malformed due dates still count: the task has a deadline, it just
    /// cannot be classified until the store fixes the value.
    pub fn has_deadline(&self) -> bool {
        !self.completed && self.due_date.is_some()
    }

    /// Badge for list rendering relative to `now_ms`.
    pub fn badge(&self, now_ms: i64, threshold_ms: i64) -> DueBadge {
        let Some(due) = self.due_epoch_ms() else {
            return DueBadge::None;
        };
        if due <= now_ms {
            DueBadge::Overdue
        } else if due - now_ms <= threshold_ms {
            DueBadge::DueSoon
        } else {
            DueBadge::Deadline
        }
    }
}

/// Parses persisted due-date text into epoch milliseconds.
///
/// Accepts RFC 3339 only; persisted values are always written normalized.
pub fn parse_due_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}

/// Normalizes user deadline input into RFC 3339 UTC text.
///
/// Accepts `YYYY-MM-DD HH:mm`, `YYYY-MM-DDTHH:mm[:ss]` (interpreted in the
/// local time zone) and full RFC 3339. Returns `None` for unreadable input.
pub fn normalize_due_input(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(epoch_ms) = parse_due_date(trimmed) {
        return format_rfc3339(epoch_ms);
    }

    let candidate = trimmed.replacen(' ', "T", 1);
    let naive = NAIVE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&candidate, format).ok())?;
    let local = match Local.from_local_datetime(&naive) {
        LocalResult::Single(value) => value,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => return None,
    };
    format_rfc3339(local.timestamp_millis())
}

/// Human-readable deadline for list rows and alert bodies.
pub fn format_due_date(due_date: Option<&str>) -> String {
    let Some(raw) = due_date else {
        return "No deadline".to_string();
    };
    match parse_due_date(raw).and_then(|epoch_ms| Local.timestamp_millis_opt(epoch_ms).single()) {
        Some(local) => local.format(DISPLAY_FORMAT).to_string(),
        None => "Unknown deadline".to_string(),
    }
}

fn format_rfc3339(epoch_ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|value| value.to_rfc3339_opts(SecondsFormat::Millis, true))
}
