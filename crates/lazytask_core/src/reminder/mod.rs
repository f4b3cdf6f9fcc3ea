//! Deadline reminder scheduler.
//!
//! # Responsibility
//! - Classify open tasks as due soon or overdue on every trigger.
//! - Emit at most one alert per task per classification until re-armed.
//! - Drive evaluation from interval ticks, app foregrounding, screen focus
//!   and task mutations through one entry point.
//!
//! # Invariants
//! - Scheduler state belongs to one owned instance; nothing is global.
//! - Evaluation passes never overlap.
//! - Reminder memory lives only as long as the scheduler (no persistence).

pub mod clock;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod evaluator;
pub mod runtime;
pub mod scheduler;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{ConfigError, ReminderConfig};
pub use dedup::{NotificationDedupStore, NotificationFlags, ReminderDelta};
pub use dispatch::{
    AlertDispatcher, AlertMessage, DispatchError, LogAlertDispatcher, QueuedAlertDispatcher,
    ReminderKind,
};
pub use evaluator::{active_ids, classify, Classification};
pub use runtime::{AppLifecycle, ReminderHandle, ReminderRuntime, ReminderTrigger, SpawnError};
pub use scheduler::{
    EvaluationError, LifecycleError, PassReport, ReminderScheduler, SchedulerState,
    TriggerSource,
};
pub use source::{SnapshotError, SqliteTaskSource, TaskSnapshotSource};
