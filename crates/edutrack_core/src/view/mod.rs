//! Read-only derivations over store snapshots.
//!
//! # Responsibility
//! - Compute display values (progress, next exam, syllabus details) from the
//!   collections held by `OptimisticStore`.
//!
//! # Invariants
//! - Pure functions: no state, no I/O, no logging.

pub mod exams;
pub mod progress;
