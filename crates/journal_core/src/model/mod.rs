//! Persisted journal entities.
//!
//! # Responsibility
//! - Define the row shapes the import pipeline reads and writes.
//!
//! # Invariants
//! - Every entity is identified by an opaque, never-reused `RecordId`.
//! - Dates are `YYYY-MM-DD` calendar-date strings.

pub mod journal;
