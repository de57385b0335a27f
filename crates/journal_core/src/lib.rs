//! Core import engine for the journal app.
//! This crate owns every import invariant: parsing, reconciliation and
//! transactional writes.

pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::ImportConfig;
pub use db::{open_db, open_db_in_memory, BatchError, BusyRetryPolicy, DbError};
pub use import::{
    ExecutionEngine, ExecutionResult, ImportFormat, ImportPhase, ImportPreview, ImportProgress,
    ImportSource, NoYield, PreviewBuilder, PreviewTotals, ThreadYield, YieldHook,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::journal::{Entry, RecordId, StickyNote, Todo};
pub use repo::journal_repo::{
    BatchExecutor, JournalReader, JournalWrite, RepoError, RepoResult, SqliteJournalRepository,
};
pub use service::import_service::ImportService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
