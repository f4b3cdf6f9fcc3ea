//! Task snapshot sources for evaluation passes.
//!
//! # Invariants
//! - A snapshot is an owned, immutable copy; later store writes cannot
//!   change a pass that is already running.
//! - Any read failure surfaces as `SnapshotError`, never as a panic.

use crate::db::{open_db, DbError};
use crate::model::task::Task;
use crate::repo::task_repo::{RepoError, SqliteTaskRepository, TaskRepository};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub enum SnapshotError {
    Db(DbError),
    Repo(RepoError),
    Unavailable(String),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "task store unavailable: {err}"),
            Self::Repo(err) => write!(f, "task store read failed: {err}"),
            Self::Unavailable(reason) => write!(f, "task store unavailable: {reason}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for SnapshotError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for SnapshotError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Read-only view of the task store used by the scheduler.
pub trait TaskSnapshotSource {
    /// Latest tasks at call time, in store order.
    fn snapshot(&self) -> Result<Vec<Task>, SnapshotError>;
}

impl<S: TaskSnapshotSource + ?Sized> TaskSnapshotSource for Arc<S> {
    fn snapshot(&self) -> Result<Vec<Task>, SnapshotError> {
        (**self).snapshot()
    }
}

/// Snapshot source backed by the SQLite task database at `db_path`.
///
/// Opens a fresh connection per snapshot so the scheduler never shares a
/// connection with UI-side writers.
#[derive(Debug, Clone)]
pub struct SqliteTaskSource {
    db_path: PathBuf,
}

impl SqliteTaskSource {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl TaskSnapshotSource for SqliteTaskSource {
    fn snapshot(&self) -> Result<Vec<Task>, SnapshotError> {
        let conn = open_db(&self.db_path)?;
        let tasks = SqliteTaskRepository::new(&conn).list_tasks()?;
        Ok(tasks)
    }
}
