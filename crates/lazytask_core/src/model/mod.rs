//! Task domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Deadlines are persisted as RFC 3339 text and parsed on demand.

pub mod task;
