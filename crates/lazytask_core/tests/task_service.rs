use lazytask_core::db::open_db_in_memory;
use lazytask_core::reminder::ManualClock;
use lazytask_core::{
    parse_due_date, sort_tasks, NewTask, SqliteTaskRepository, Task, TaskService,
    TaskServiceError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn new_task(title: &str, due_input: Option<&str>) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: String::new(),
        due_input: due_input.map(str::to_string),
    }
}

#[test]
fn create_trims_title_and_normalizes_deadline() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn))
        .with_clock(ManualClock::new(1_700_000_000_000));

    let id = service
        .create_task(&new_task("  file report  ", Some("2025-12-31T17:30:00+02:00")))
        .unwrap();

    let task = service.get_task(id).unwrap().unwrap();
    assert_eq!(task.title, "file report");
    assert_eq!(task.created_at, 1_700_000_000_000);
    assert_eq!(task.due_date.as_deref(), Some("2025-12-31T15:30:00.000Z"));
    assert!(!task.completed);
}

#[test]
fn create_rejects_blank_title() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let err = service.create_task(&new_task(" \t", None)).unwrap_err();
    assert!(matches!(err, TaskServiceError::MissingTitle));
    assert!(service.list_sorted().unwrap().is_empty());
}

#[test]
fn create_rejects_unreadable_deadline() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let err = service
        .create_task(&new_task("call bank", Some("end of month")))
        .unwrap_err();
    assert!(matches!(err, TaskServiceError::InvalidDeadline(value) if value == "end of month"));
}

#[test]
fn blank_deadline_input_means_no_deadline() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let id = service.create_task(&new_task("stretch", Some("  "))).unwrap();
    assert_eq!(service.get_task(id).unwrap().unwrap().due_date, None);
}

#[test]
fn toggle_flips_completion_both_ways() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let id = service.create_task(&new_task("laundry", None)).unwrap();

    assert!(service.toggle_completion(id).unwrap().completed);
    assert!(!service.toggle_completion(id).unwrap().completed);
}

#[test]
fn set_due_date_replaces_and_clears_deadline() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let id = service.create_task(&new_task("dentist", None)).unwrap();

    let updated = service
        .set_due_date(id, Some("2030-01-02T03:04:05Z"))
        .unwrap();
    assert_eq!(
        updated.due_epoch_ms(),
        parse_due_date("2030-01-02T03:04:05Z")
    );

    let cleared = service.set_due_date(id, None).unwrap();
    assert_eq!(cleared.due_date, None);
}

#[test]
fn missing_task_maps_to_task_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let ghost = Uuid::new_v4();

    assert!(matches!(
        service.toggle_completion(ghost).unwrap_err(),
        TaskServiceError::TaskNotFound(id) if id == ghost
    ));
    assert!(matches!(
        service.remove_task(ghost).unwrap_err(),
        TaskServiceError::TaskNotFound(_)
    ));
}

#[test]
fn listeners_fire_after_each_successful_write_only() {
    let conn = open_db_in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);
    let service = TaskService::new(SqliteTaskRepository::new(&conn)).with_change_listener(
        move || {
            observed.fetch_add(1, Ordering::SeqCst);
        },
    );

    let id = service.create_task(&new_task("a", None)).unwrap();
    service.toggle_completion(id).unwrap();
    service.set_due_date(id, Some("2030-01-01 09:00")).unwrap();
    service.remove_task(id).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let _ = service.create_task(&new_task("", None));
    let _ = service.remove_task(id);
    let _ = service.list_sorted().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn sort_puts_open_tasks_first_then_deadlines_then_newest() {
    let done_early = {
        let mut task = Task::new("done", 10).due_at(1_000);
        task.completed = true;
        task
    };
    let late = Task::new("late", 1).due_at(9_000);
    let early = Task::new("early", 2).due_at(2_000);
    let undated_old = Task::new("old", 3);
    let undated_new = Task::new("new", 4);

    let mut tasks = vec![
        undated_old.clone(),
        done_early.clone(),
        late.clone(),
        undated_new.clone(),
        early.clone(),
    ];
    sort_tasks(&mut tasks);

    let titles = tasks
        .iter()
        .map(|task| task.title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["early", "late", "new", "old", "done"]);
}

#[test]
fn list_sorted_applies_display_order() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(0);
    let service =
        TaskService::new(SqliteTaskRepository::new(&conn)).with_clock(clock.clone());

    service.create_task(&new_task("undated", None)).unwrap();
    clock.set(1);
    service
        .create_task(&new_task("dated", Some("2030-05-01T08:00:00Z")))
        .unwrap();

    let titles = service
        .list_sorted()
        .unwrap()
        .into_iter()
        .map(|task| task.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["dated", "undated"]);
}
