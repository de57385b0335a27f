//! Import use-case service.
//!
//! # Responsibility
//! - Expose the preview/execute pair to host callers.
//! - Wire one store into both the preview builder and the execution engine.
//!
//! # Invariants
//! - The service never opens connections on its own; the store is injected.
//! - Execution always reloads state; it never trusts the preview snapshot.

use crate::config::ImportConfig;
use crate::import::{
    ExecutionEngine, ExecutionResult, ImportPreview, ImportProgress, ImportSource,
    PreviewBuilder, YieldHook,
};
use crate::repo::journal_repo::{
    BatchExecutor, JournalReader, RepoResult, SqliteJournalRepository,
};
use rusqlite::Connection;

/// Use-case service wrapper for bulk imports.
pub struct ImportService<S: JournalReader + BatchExecutor> {
    store: S,
    config: ImportConfig,
}

impl<'conn> ImportService<SqliteJournalRepository<'conn>> {
    /// Service over a migrated connection, using `config.busy_retry` for writes.
    pub fn for_connection(conn: &'conn Connection, config: ImportConfig) -> Self {
        let store = SqliteJournalRepository::with_retry_policy(conn, config.busy_retry);
        Self::with_config(store, config)
    }
}

impl<S: JournalReader + BatchExecutor> ImportService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ImportConfig::default())
    }

    pub fn with_config(store: S, config: ImportConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Dry-runs `source` against the current journal state.
    pub fn build_preview(
        &self,
        source: &ImportSource,
        on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> RepoResult<ImportPreview> {
        PreviewBuilder::new(&self.store).build(source, on_progress)
    }

    /// Applies a previously built preview.
    pub fn execute_plan(
        &self,
        preview: &ImportPreview,
        on_progress: Option<&mut dyn FnMut(ImportProgress)>,
        scheduler: &mut dyn YieldHook,
    ) -> ExecutionResult {
        ExecutionEngine::with_config(&self.store, &self.store, self.config)
            .execute(preview, on_progress, scheduler)
    }
}
