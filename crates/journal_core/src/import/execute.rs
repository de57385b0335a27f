//! Import execution engine.
//!
//! # Responsibility
//! - Replay preview classification against freshly loaded state.
//! - Stage journal writes and flush them in fixed-size transactional chunks.
//! - Report progress and hand control back to the host periodically.
//!
//! # Invariants
//! - A preview with validation errors is rejected before any store access.
//! - Each chunk commits or rolls back as a unit; earlier chunks stay
//!   committed when a later one fails and the result says how many did.
//! - On failure the creation/append counters are zero.
//!
//! # See also
//! - docs: `DESIGN.md` (chunk atomicity decision)

use crate::config::ImportConfig;
use crate::db::BatchError;
use crate::import::progress::{ImportPhase, ImportProgress, YieldHook};
use crate::import::reconcile::{EntryDecision, ReconciliationState, TodoDecision};
use crate::import::types::{ExecutionResult, ImportPreview};
use crate::model::journal::{new_record_id, Entry, StickyNote, Todo};
use crate::repo::journal_repo::{BatchExecutor, JournalReader, JournalWrite, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const INVALID_PREVIEW_MESSAGE: &str =
    "Cannot execute import while preview has validation errors";

/// Fatal execution failure. Converted into `ExecutionResult::errors`.
#[derive(Debug)]
pub enum ImportError {
    /// Current state could not be loaded.
    Repo(RepoError),
    /// Write chunk `batch` (1-based) of `batches` was rolled back.
    Batch {
        batch: usize,
        batches: usize,
        source: BatchError,
    },
    /// The preview is internally inconsistent.
    InvalidState(String),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "unable to load journal state: {err}"),
            Self::Batch {
                batch,
                batches,
                source,
            } => write!(f, "write batch {batch} of {batches} failed: {source}"),
            Self::InvalidState(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Batch { source, .. } => Some(source),
            Self::InvalidState(_) => None,
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Executes previews through an injected reader and transactional writer.
pub struct ExecutionEngine<'a, R: JournalReader + ?Sized, B: BatchExecutor + ?Sized> {
    reader: &'a R,
    writer: &'a B,
    config: ImportConfig,
}

impl<'a, R, B> ExecutionEngine<'a, R, B>
where
    R: JournalReader + ?Sized,
    B: BatchExecutor + ?Sized,
{
    pub fn new(reader: &'a R, writer: &'a B) -> Self {
        Self::with_config(reader, writer, ImportConfig::default())
    }

    pub fn with_config(reader: &'a R, writer: &'a B, config: ImportConfig) -> Self {
        Self {
            reader,
            writer,
            config,
        }
    }

    /// Applies `preview.plan` to the store.
    ///
    /// Never returns an error: failures are reported through the result with
    /// all creation/append counters zeroed and a single message.
    pub fn execute(
        &self,
        preview: &ImportPreview,
        on_progress: Option<&mut dyn FnMut(ImportProgress)>,
        scheduler: &mut dyn YieldHook,
    ) -> ExecutionResult {
        if !preview.is_executable() {
            warn!(
                "event=import_execute module=import status=rejected format={} preview_errors={}",
                preview.format,
                preview.errors.len()
            );
            return ExecutionResult::rejected(INVALID_PREVIEW_MESSAGE);
        }

        let started_at = Instant::now();
        info!(
            "event=import_execute module=import status=start format={} records={}",
            preview.format,
            preview.plan.records.total()
        );

        let mut run = Run {
            result: ExecutionResult::default(),
            on_progress,
        };
        match self.run(preview, &mut run, scheduler) {
            Ok(()) => {
                let result = run.result;
                info!(
                    "event=import_execute module=import status=ok entries_created={} entries_appended={} todos_created={} sticky_notes_created={} duplicates_skipped={} batches={} duration_ms={}",
                    result.entries_created,
                    result.entries_appended,
                    result.todos_created,
                    result.sticky_notes_created,
                    result.duplicates_skipped,
                    result.write_batches_committed,
                    started_at.elapsed().as_millis()
                );
                result
            }
            Err(err) => {
                let committed = run.result.write_batches_committed;
                error!(
                    "event=import_execute module=import status=error batches_committed={committed} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                ExecutionResult {
                    duplicates_skipped: run.result.duplicates_skipped,
                    write_batches_committed: committed,
                    errors: vec![format!(
                        "Import failed: {err} ({committed} write batch(es) committed before the failure)"
                    )],
                    ..ExecutionResult::default()
                }
            }
        }
    }

    fn run(
        &self,
        preview: &ImportPreview,
        run: &mut Run<'_>,
        scheduler: &mut dyn YieldHook,
    ) -> Result<(), ImportError> {
        if preview.plan.source.format != preview.format {
            return Err(ImportError::InvalidState(format!(
                "preview format {} does not match plan source format {}",
                preview.format, preview.plan.source.format
            )));
        }

        let records = &preview.plan.records;
        let total = records.total();
        let mut state = ReconciliationState::load_for_execution(self.reader)?;
        let mut writes = Vec::with_capacity(total);
        let mut processed = 0usize;
        run.report(processed, total, ImportPhase::Processing);

        for record in &records.entries {
            match state.reconcile_entry(record) {
                EntryDecision::Created { id } => {
                    writes.push(JournalWrite::InsertEntry(Entry {
                        id,
                        date: record.date.clone(),
                        content: record.content.clone(),
                    }));
                    run.result.entries_created += 1;
                }
                EntryDecision::Appended { id, content } => {
                    writes.push(JournalWrite::UpdateEntryContent { id, content });
                    run.result.entries_appended += 1;
                }
                EntryDecision::Duplicate => run.result.duplicates_skipped += 1,
            }
            processed += 1;
            self.after_record(run, scheduler, processed, total);
        }

        for record in &records.todos {
            match state.reconcile_todo(record) {
                TodoDecision::Created { position } => {
                    writes.push(JournalWrite::InsertTodo(Todo {
                        id: new_record_id(),
                        date: record.date.clone(),
                        content: record.content.clone(),
                        scheduled_time: record.scheduled_time.clone(),
                        completed: record.completed,
                        position,
                    }));
                    run.result.todos_created += 1;
                }
                TodoDecision::Duplicate => run.result.duplicates_skipped += 1,
            }
            processed += 1;
            self.after_record(run, scheduler, processed, total);
        }

        for record in &records.sticky_notes {
            if state.reconcile_sticky_note(record) {
                writes.push(JournalWrite::InsertStickyNote(StickyNote {
                    id: new_record_id(),
                    date: record.date.clone(),
                    content: record.content.clone(),
                }));
                run.result.sticky_notes_created += 1;
            } else {
                run.result.duplicates_skipped += 1;
            }
            processed += 1;
            self.after_record(run, scheduler, processed, total);
        }

        self.flush(&writes, run, total)
    }

    fn after_record(
        &self,
        run: &mut Run<'_>,
        scheduler: &mut dyn YieldHook,
        processed: usize,
        total: usize,
    ) {
        run.report(processed, total, ImportPhase::Processing);
        if self.config.yield_every > 0 && processed % self.config.yield_every == 0 {
            scheduler.yield_now();
        }
    }

    fn flush(
        &self,
        writes: &[JournalWrite],
        run: &mut Run<'_>,
        processing_total: usize,
    ) -> Result<(), ImportError> {
        let chunk_size = self.config.write_chunk_size.max(1);
        let batches = writes.len().div_ceil(chunk_size);
        if batches == 0 {
            return Ok(());
        }

        let total = processing_total + batches;
        run.report(processing_total, total, ImportPhase::Writing);
        for (index, chunk) in writes.chunks(chunk_size).enumerate() {
            let batch = index + 1;
            let started_at = Instant::now();
            if let Err(source) = self.writer.execute_batch(chunk) {
                error!(
                    "event=import_write_batch module=import status=error batch={batch} batches={batches} writes={} first_kind={} duration_ms={} error={source}",
                    chunk.len(),
                    chunk.first().map_or("none", JournalWrite::kind),
                    started_at.elapsed().as_millis()
                );
                return Err(ImportError::Batch {
                    batch,
                    batches,
                    source,
                });
            }
            run.result.write_batches_committed += 1;
            info!(
                "event=import_write_batch module=import status=ok batch={batch} batches={batches} writes={} duration_ms={}",
                chunk.len(),
                started_at.elapsed().as_millis()
            );
            run.report(processing_total + batch, total, ImportPhase::Writing);
        }
        Ok(())
    }
}

/// Per-run counters plus the caller's progress sink.
struct Run<'p> {
    result: ExecutionResult,
    on_progress: Option<&'p mut dyn FnMut(ImportProgress)>,
}

impl Run<'_> {
    fn report(&mut self, current: usize, total: usize, phase: ImportPhase) {
        if let Some(callback) = self.on_progress.as_deref_mut() {
            callback(ImportProgress {
                current,
                total,
                phase,
            });
        }
    }
}
