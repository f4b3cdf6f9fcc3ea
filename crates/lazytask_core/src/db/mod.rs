//! Task store bootstrap.
//!
//! # Responsibility
//! - Open the LazyTask SQLite file and bring its `tasks` schema up to date.
//! - Report which migration step failed when an upgrade cannot complete.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Tasks are not read or written before migrations succeed.
//! - A failed upgrade leaves the file at its previous version.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// A migration script failed; its transaction was rolled back.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a newer LazyTask build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Migration version that failed, if the error came from an upgrade step.
    pub fn failed_migration(&self) -> Option<u32> {
        match self {
            Self::Migration { version, .. } => Some(*version),
            Self::Sqlite(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "task store error: {err}"),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "task store migration {version} ({name}) failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "task database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
