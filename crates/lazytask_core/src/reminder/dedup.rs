//! Per-task notification memory.
//!
//! # Responsibility
//! - Turn a classification into the delta of newly crossed tasks.
//! - Forget tasks that are no longer active.
//!
//! # Invariants
//! - Entries exist only for ids in the latest active set; everything else is
//!   dropped on the very next `reconcile`.
//! - `overdue_notified` is only cleared by dropping the entry.
//! - `soon_notified` is re-armed when a task leaves both sets, so a
//!   postponed deadline can notify again.
//! - An entry with both flags cleared is removed.

use crate::model::task::TaskId;
use crate::reminder::evaluator::Classification;
use std::collections::{HashMap, HashSet};

/// Notification state kept for one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFlags {
    pub soon_notified: bool,
    pub overdue_notified: bool,
}

impl NotificationFlags {
    fn is_clear(&self) -> bool {
        !self.soon_notified && !self.overdue_notified
    }
}

/// Newly crossed tasks from one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderDelta {
    pub new_soon: HashSet<TaskId>,
    pub new_overdue: HashSet<TaskId>,
}

impl ReminderDelta {
    pub fn is_empty(&self) -> bool {
        self.new_soon.is_empty() && self.new_overdue.is_empty()
    }
}

/// Notification memory for one scheduler instance.
#[derive(Debug, Default)]
pub struct NotificationDedupStore {
    memory: HashMap<TaskId, NotificationFlags>,
}

impl NotificationDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one classification and returns only the new crossings.
    ///
    /// `active_ids` must already exclude completed and deadline-less tasks.
    /// Classified ids outside `active_ids` are ignored.
    pub fn reconcile(
        &mut self,
        classification: &Classification,
        active_ids: &HashSet<TaskId>,
    ) -> ReminderDelta {
        self.memory.retain(|id, _| active_ids.contains(id));

        let mut delta = ReminderDelta::default();

        for id in classification.overdue.iter().filter(|id| active_ids.contains(*id)) {
            let flags = self.memory.entry(*id).or_default();
            if !flags.overdue_notified {
                flags.overdue_notified = true;
                delta.new_overdue.insert(*id);
            }
        }

        for id in classification.soon.iter().filter(|id| active_ids.contains(*id)) {
            let flags = self.memory.entry(*id).or_default();
            if !flags.soon_notified {
                flags.soon_notified = true;
                delta.new_soon.insert(*id);
            }
        }

        for (id, flags) in self.memory.iter_mut() {
            if flags.soon_notified
                && !classification.soon.contains(id)
                && !classification.overdue.contains(id)
            {
                flags.soon_notified = false;
            }
        }
        self.memory.retain(|_, flags| !flags.is_clear());

        delta
    }

    pub fn flags(&self, id: &TaskId) -> Option<NotificationFlags> {
        self.memory.get(id).copied()
    }

    pub fn is_soon_notified(&self, id: &TaskId) -> bool {
        self.flags(id).is_some_and(|flags| flags.soon_notified)
    }

    pub fn is_overdue_notified(&self, id: &TaskId) -> bool {
        self.flags(id).is_some_and(|flags| flags.overdue_notified)
    }

    /// Number of tasks currently remembered.
    pub fn tracked_len(&self) -> usize {
        self.memory.len()
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }
}
