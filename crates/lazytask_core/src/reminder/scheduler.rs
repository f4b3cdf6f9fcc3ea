//! Reminder scheduler state machine and evaluation pass.
//!
//! # Responsibility
//! - Own the dedup memory for one task list.
//! - Funnel every trigger source into a single evaluation pass.
//! - Enforce the `Idle -> Running -> Stopped` lifecycle.
//!
//! # Invariants
//! - Passes only run while `Running`; requests in other states are ignored.
//! - `Stopped` is terminal.
//! - A failed snapshot leaves dedup memory untouched.
//! - Dedup flags are committed before dispatch and never rolled back.
//! - All mutation goes through `&mut self`, so passes cannot overlap.

use crate::model::task::{Task, TaskId};
use crate::reminder::clock::Clock;
use crate::reminder::config::ReminderConfig;
use crate::reminder::dedup::NotificationDedupStore;
use crate::reminder::dispatch::{AlertDispatcher, ReminderKind};
use crate::reminder::evaluator::{active_ids, classify};
use crate::reminder::source::{SnapshotError, TaskSnapshotSource};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle state of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Why an evaluation pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// Immediate pass performed by `start()`.
    Start,
    /// Periodic tick.
    Interval,
    /// App returned to the foreground.
    Foreground,
    /// Owning screen became visible.
    FocusGained,
    /// Task list was written.
    TasksMutated,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Interval => "interval",
            Self::Foreground => "foreground",
            Self::FocusGained => "focus",
            Self::TasksMutated => "mutation",
        }
    }
}

/// Contract violations of the scheduler lifecycle.
///
/// These are caller bugs, kept separate from runtime conditions
/// (`EvaluationError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    AlreadyRunning,
    AlreadyStopped,
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "reminder scheduler already running"),
            Self::AlreadyStopped => write!(f, "reminder scheduler was stopped and cannot restart"),
        }
    }
}

impl Error for LifecycleError {}

/// Runtime conditions that abort one pass.
#[derive(Debug)]
pub enum EvaluationError {
    SnapshotUnavailable(SnapshotError),
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SnapshotUnavailable(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EvaluationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SnapshotUnavailable(err) => Some(err),
        }
    }
}

/// Outcome of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub source: TriggerSource,
    /// Newly due-soon tasks, in snapshot order.
    pub new_soon: Vec<TaskId>,
    /// Newly overdue tasks, in snapshot order.
    pub new_overdue: Vec<TaskId>,
    /// Batches the sink failed to present.
    pub dispatch_failures: usize,
}

impl PassReport {
    pub fn is_quiet(&self) -> bool {
        self.new_soon.is_empty() && self.new_overdue.is_empty()
    }
}

/// Deadline reminder scheduler for one task list.
pub struct ReminderScheduler<S, D, C> {
    source: S,
    dispatcher: D,
    clock: C,
    config: ReminderConfig,
    dedup: NotificationDedupStore,
    state: SchedulerState,
    snapshot_failing: bool,
}

impl<S, D, C> ReminderScheduler<S, D, C>
where
    S: TaskSnapshotSource,
    D: AlertDispatcher,
    C: Clock,
{
    pub fn new(source: S, dispatcher: D, clock: C, config: ReminderConfig) -> Self {
        Self {
            source,
            dispatcher,
            clock,
            config,
            dedup: NotificationDedupStore::new(),
            state: SchedulerState::Idle,
            snapshot_failing: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    pub fn dedup(&self) -> &NotificationDedupStore {
        &self.dedup
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Moves `Idle -> Running` and performs one immediate pass.
    ///
    /// A failure of that first pass is logged and left to the next trigger;
    /// the scheduler still counts as started.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            SchedulerState::Idle => {}
            SchedulerState::Running => return Err(LifecycleError::AlreadyRunning),
            SchedulerState::Stopped => return Err(LifecycleError::AlreadyStopped),
        }

        self.state = SchedulerState::Running;
        info!(
            "event=reminder_start module=reminder status=ok threshold_ms={} tick_interval_ms={}",
            self.config.threshold_ms, self.config.tick_interval_ms
        );
        let _ = self.request_evaluation(TriggerSource::Start);
        Ok(())
    }

    /// Moves to `Stopped`. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Running {
            info!(
                "event=reminder_stop module=reminder status=ok tracked={}",
                self.dedup.tracked_len()
            );
        }
        self.state = SchedulerState::Stopped;
    }

    /// Single entry point for every trigger source.
    ///
    /// Returns `Ok(None)` when the scheduler is not running.
    pub fn request_evaluation(
        &mut self,
        source: TriggerSource,
    ) -> Result<Option<PassReport>, EvaluationError> {
        if self.state != SchedulerState::Running {
            debug!(
                "event=reminder_pass module=reminder status=ignored source={} state={:?}",
                source.as_str(),
                self.state
            );
            return Ok(None);
        }
        self.evaluate(source).map(Some)
    }

    pub fn on_tick(&mut self) -> Result<Option<PassReport>, EvaluationError> {
        self.request_evaluation(TriggerSource::Interval)
    }

    pub fn on_foreground(&mut self) -> Result<Option<PassReport>, EvaluationError> {
        self.request_evaluation(TriggerSource::Foreground)
    }

    pub fn on_focus_gained(&mut self) -> Result<Option<PassReport>, EvaluationError> {
        self.request_evaluation(TriggerSource::FocusGained)
    }

    pub fn on_tasks_mutated(&mut self) -> Result<Option<PassReport>, EvaluationError> {
        self.request_evaluation(TriggerSource::TasksMutated)
    }

    fn evaluate(&mut self, source: TriggerSource) -> Result<PassReport, EvaluationError> {
        let tasks = self.fetch_snapshot(source)?;
        let now_ms = self.clock.now_ms();

        let classification = classify(&tasks, now_ms, self.config.threshold_ms);
        let delta = self.dedup.reconcile(&classification, &active_ids(&tasks));

        let overdue = select_in_order(&tasks, &delta.new_overdue);
        let soon = select_in_order(&tasks, &delta.new_soon);

        let mut dispatch_failures = 0;
        if !self.dispatch(ReminderKind::Overdue, &overdue) {
            dispatch_failures += 1;
        }
        if !self.dispatch(ReminderKind::DueSoon, &soon) {
            dispatch_failures += 1;
        }

        debug!(
            "event=reminder_pass module=reminder status=ok source={} tasks={} soon={} overdue={} new_soon={} new_overdue={} tracked={}",
            source.as_str(),
            tasks.len(),
            classification.soon.len(),
            classification.overdue.len(),
            soon.len(),
            overdue.len(),
            self.dedup.tracked_len()
        );

        Ok(PassReport {
            source,
            new_soon: soon.iter().map(|task| task.id).collect(),
            new_overdue: overdue.iter().map(|task| task.id).collect(),
            dispatch_failures,
        })
    }

    fn fetch_snapshot(&mut self, source: TriggerSource) -> Result<Vec<Task>, EvaluationError> {
        match self.source.snapshot() {
            Ok(tasks) => {
                if self.snapshot_failing {
                    self.snapshot_failing = false;
                    info!(
                        "event=reminder_snapshot module=reminder status=recovered source={}",
                        source.as_str()
                    );
                }
                Ok(tasks)
            }
            Err(err) => {
                // One warning per failure streak; the next trigger retries.
                if self.snapshot_failing {
                    debug!(
                        "event=reminder_snapshot module=reminder status=error source={} error={err}",
                        source.as_str()
                    );
                } else {
                    warn!(
                        "event=reminder_snapshot module=reminder status=error error_code=snapshot_unavailable source={} error={err}",
                        source.as_str()
                    );
                }
                self.snapshot_failing = true;
                Err(EvaluationError::SnapshotUnavailable(err))
            }
        }
    }

    /// Returns `false` only when the sink reported a failure.
    fn dispatch(&self, kind: ReminderKind, tasks: &[Task]) -> bool {
        if tasks.is_empty() {
            return true;
        }
        match self.dispatcher.present_batch(kind, tasks) {
            Ok(()) => {
                info!(
                    "event=reminder_dispatch module=reminder status=ok kind={} count={}",
                    kind.as_str(),
                    tasks.len()
                );
                true
            }
            Err(err) => {
                warn!(
                    "event=reminder_dispatch module=reminder status=error kind={} count={} error={err}",
                    kind.as_str(),
                    tasks.len()
                );
                false
            }
        }
    }
}

fn select_in_order(tasks: &[Task], ids: &HashSet<TaskId>) -> Vec<Task> {
    if ids.is_empty() {
        return Vec::new();
    }
    tasks
        .iter()
        .filter(|task| ids.contains(&task.id))
        .cloned()
        .collect()
}
