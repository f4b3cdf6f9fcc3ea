//! Task schema migrations.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply every pending migration inside one transaction.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A database stamped with a newer version than this binary knows is
//!   never touched.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "init_tasks",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations and returns how many were applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &mut Connection, migrations: &[Migration]) -> DbResult<usize> {
    let from_version = current_user_version(conn)?;
    let latest = migrations.last().map_or(0, |migration| migration.version);

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        if let Err(err) = run_step(&tx, migration) {
            error!(
                "event=db_migrate module=db status=error error_code=migration_failed version={} name={} error={err}",
                migration.version, migration.name
            );
            // Dropping `tx` rolls back every step applied in this call.
            return Err(DbError::Migration {
                version: migration.version,
                name: migration.name,
                source: err,
            });
        }
        info!(
            "event=db_migrate module=db status=applied version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(pending.len())
}

fn run_step(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    conn.execute_batch(migration.sql)?;
    conn.pragma_update(None, "user_version", migration.version)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
