use lazytask_core::db::open_db;
use lazytask_core::reminder::TokioClock;
use lazytask_core::{
    AlertDispatcher, AppLifecycle, ConfigError, DispatchError, LifecycleError, NewTask,
    ReminderConfig, ReminderKind, ReminderRuntime, ReminderScheduler, SnapshotError,
    SpawnError, SqliteTaskRepository, SqliteTaskSource, Task, TaskId, TaskService,
    TaskSnapshotSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

const NOW: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60_000;

#[derive(Clone, Default)]
struct FakeStore {
    tasks: Arc<Mutex<Vec<Task>>>,
    snapshots: Arc<AtomicUsize>,
}

impl FakeStore {
    fn push(&self, task: Task) {
        self.tasks.lock().unwrap().push(task);
    }

    fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

impl TaskSnapshotSource for FakeStore {
    fn snapshot(&self) -> Result<Vec<Task>, SnapshotError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(self.tasks.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<(ReminderKind, Vec<TaskId>)>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<(ReminderKind, Vec<TaskId>)> {
        std::mem::take(&mut *self.batches.lock().unwrap())
    }
}

impl AlertDispatcher for RecordingSink {
    fn present_batch(&self, kind: ReminderKind, tasks: &[Task]) -> Result<(), DispatchError> {
        self.batches
            .lock()
            .unwrap()
            .push((kind, tasks.iter().map(|task| task.id).collect()));
        Ok(())
    }
}

fn one_minute_config() -> ReminderConfig {
    ReminderConfig {
        threshold_ms: MINUTE,
        tick_interval_ms: 60_000,
    }
}

/// Lets the reminder task drain everything that is ready.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn interval_ticks_drive_soon_then_overdue() {
    let store = FakeStore::default();
    let task = Task::new("standup", 0).due_at(NOW + 100_000);
    store.push(task.clone());
    let sink = Arc::new(RecordingSink::default());
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::clone(&sink),
        TokioClock::anchored_at(NOW),
        one_minute_config(),
    );

    let mut handle = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap();
    settle().await;
    assert!(sink.take().is_empty());

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(sink.take(), vec![(ReminderKind::DueSoon, vec![task.id])]);

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(sink.take(), vec![(ReminderKind::Overdue, vec![task.id])]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn missed_ticks_are_skipped_not_replayed() {
    let store = FakeStore::default();
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        TokioClock::anchored_at(NOW),
        one_minute_config(),
    );

    let mut handle = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap();
    assert_eq!(store.snapshot_count(), 1);
    settle().await;

    tokio::time::advance(Duration::from_secs(10 * 60)).await;
    settle().await;
    assert_eq!(store.snapshot_count(), 2);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn returning_to_foreground_triggers_a_pass() {
    let store = FakeStore::default();
    let sink = Arc::new(RecordingSink::default());
    let (lifecycle, lifecycle_rx) = watch::channel(AppLifecycle::Active);
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::clone(&sink),
        TokioClock::anchored_at(NOW),
        ReminderConfig::default(),
    );
    let mut handle =
        ReminderRuntime::spawn(&Handle::current(), scheduler, Some(lifecycle_rx)).unwrap();

    let task = Task::new("pay invoice", 0).due_at(NOW - MINUTE);
    store.push(task.clone());

    lifecycle.send(AppLifecycle::Background).unwrap();
    settle().await;
    assert!(sink.take().is_empty());

    lifecycle.send(AppLifecycle::Active).unwrap();
    settle().await;
    assert_eq!(sink.take(), vec![(ReminderKind::Overdue, vec![task.id])]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn focus_and_mutation_triggers_share_dedup_memory() {
    let store = FakeStore::default();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::clone(&sink),
        TokioClock::anchored_at(NOW),
        ReminderConfig::default(),
    );
    let mut handle = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap();
    let trigger = handle.trigger();

    let task = Task::new("submit form", 0).due_at(NOW + 10 * MINUTE);
    store.push(task.clone());

    trigger.focus_gained();
    trigger.tasks_mutated();
    trigger.foreground();
    settle().await;

    assert_eq!(sink.take(), vec![(ReminderKind::DueSoon, vec![task.id])]);
    assert_eq!(store.snapshot_count(), 4);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_pass_runs_after_stop_resolves() {
    let store = FakeStore::default();
    let sink = Arc::new(RecordingSink::default());
    let (lifecycle, lifecycle_rx) = watch::channel(AppLifecycle::Active);
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::clone(&sink),
        TokioClock::anchored_at(NOW),
        one_minute_config(),
    );
    let mut handle =
        ReminderRuntime::spawn(&Handle::current(), scheduler, Some(lifecycle_rx)).unwrap();
    let trigger = handle.trigger();
    assert!(handle.is_running());

    handle.stop().await;
    assert!(!handle.is_running());
    let count = store.snapshot_count();

    store.push(Task::new("too late", 0).due_at(NOW - MINUTE));
    trigger.focus_gained();
    trigger.tasks_mutated();
    let _ = lifecycle.send(AppLifecycle::Background);
    let _ = lifecycle.send(AppLifecycle::Active);
    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    settle().await;

    assert_eq!(store.snapshot_count(), count);
    assert!(sink.take().is_empty());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_the_loop() {
    let store = FakeStore::default();
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        TokioClock::anchored_at(NOW),
        one_minute_config(),
    );
    let handle = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap();
    drop(handle);
    settle().await;

    let count = store.snapshot_count();
    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    settle().await;
    assert_eq!(store.snapshot_count(), count);
}

#[tokio::test(start_paused = true)]
async fn spawning_a_started_scheduler_is_rejected() {
    let mut scheduler = ReminderScheduler::new(
        FakeStore::default(),
        Arc::new(RecordingSink::default()),
        TokioClock::anchored_at(NOW),
        ReminderConfig::default(),
    );
    scheduler.start().unwrap();

    let err = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap_err();
    assert!(matches!(
        err,
        SpawnError::Lifecycle(LifecycleError::AlreadyRunning)
    ));
}

#[tokio::test(start_paused = true)]
async fn zero_tick_interval_is_rejected_before_start() {
    let store = FakeStore::default();
    let sink = Arc::new(RecordingSink::default());
    store.push(Task::new("overdue", 0).due_at(NOW - MINUTE));
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::clone(&sink),
        TokioClock::anchored_at(NOW),
        ReminderConfig {
            threshold_ms: MINUTE,
            tick_interval_ms: 0,
        },
    );

    let err = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap_err();
    assert!(matches!(
        err,
        SpawnError::InvalidConfig(ConfigError::ZeroTickInterval)
    ));
    assert!(err.to_string().contains("tick_interval_ms"));

    // No start pass ran.
    settle().await;
    assert_eq!(store.snapshot_count(), 0);
    assert!(sink.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_positive_threshold_is_rejected_before_start() {
    let store = FakeStore::default();
    let scheduler = ReminderScheduler::new(
        store.clone(),
        Arc::new(RecordingSink::default()),
        TokioClock::anchored_at(NOW),
        ReminderConfig {
            threshold_ms: 0,
            tick_interval_ms: 60_000,
        },
    );

    let err = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap_err();
    assert!(matches!(
        err,
        SpawnError::InvalidConfig(ConfigError::NonPositiveThreshold(0))
    ));
    assert_eq!(store.snapshot_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn service_writes_wake_the_scheduler_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let conn = open_db(&path).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let scheduler = ReminderScheduler::new(
        SqliteTaskSource::new(&path),
        Arc::clone(&sink),
        TokioClock::anchored_at(NOW),
        ReminderConfig::default(),
    );
    let mut handle = ReminderRuntime::spawn(&Handle::current(), scheduler, None).unwrap();
    let trigger = handle.trigger();
    let service = TaskService::new(SqliteTaskRepository::new(&conn))
        .with_change_listener(move || trigger.tasks_mutated());

    let due_input = Task::new("renewal", 0).due_at(NOW + 30 * MINUTE).due_date;
    let id = service
        .create_task(&NewTask {
            title: "renew insurance".to_string(),
            description: String::new(),
            due_input,
        })
        .unwrap();
    settle().await;
    assert_eq!(sink.take(), vec![(ReminderKind::DueSoon, vec![id])]);

    service.toggle_completion(id).unwrap();
    settle().await;
    service.toggle_completion(id).unwrap();
    settle().await;
    // Reopening forgets the old memory, so the alert fires again.
    assert_eq!(sink.take(), vec![(ReminderKind::DueSoon, vec![id])]);

    handle.stop().await;
}
