//! Due-state classification.
//!
//! # Responsibility
//! - Split a task snapshot into "due soon" and "overdue" id sets.
//!
//! # Invariants
//! - Pure: identical inputs always yield identical output.
//! - `soon` and `overdue` are disjoint; overdue wins at `due == now`.
//! - Completed, deadline-less and malformed-deadline tasks are never
//!   classified, and malformed input never produces an error.

use crate::model::task::{Task, TaskId};
use std::collections::HashSet;

/// Per-pass classification of a task snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub soon: HashSet<TaskId>,
    pub overdue: HashSet<TaskId>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.soon.is_empty() && self.overdue.is_empty()
    }
}

/// Classifies `tasks` against `now_ms`.
///
/// - overdue: `due <= now`
/// - soon: `now < due <= now + threshold_ms`
pub fn classify(tasks: &[Task], now_ms: i64, threshold_ms: i64) -> Classification {
    let soon_limit = now_ms.saturating_add(threshold_ms);
    let mut classification = Classification::default();

    for task in tasks {
        if task.completed {
            continue;
        }
        let Some(due) = task.due_epoch_ms() else {
            continue;
        };

        if due <= now_ms {
            classification.overdue.insert(task.id);
        } else if due <= soon_limit {
            classification.soon.insert(task.id);
        }
    }

    classification
}

/// Ids eligible for dedup tracking: open tasks that carry any deadline text.
pub fn active_ids(tasks: &[Task]) -> HashSet<TaskId> {
    tasks
        .iter()
        .filter(|task| task.has_deadline())
        .map(|task| task.id)
        .collect()
}
