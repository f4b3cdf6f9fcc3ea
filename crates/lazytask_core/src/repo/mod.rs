//! Repository layer for task persistence.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service and reminder orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Task::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod task_repo;
