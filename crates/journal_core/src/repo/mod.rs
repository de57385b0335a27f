//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the read and transactional-write contracts the import pipeline
//!   depends on.
//! - Isolate SQLite query details from reconciliation logic.
//!
//! # Invariants
//! - Reads have no side effects.
//! - Writes only happen through `BatchExecutor::execute_batch`.

pub mod journal_repo;
