//! Dry-run preview of an import.
//!
//! # Responsibility
//! - Parse the source and classify every record against current state.
//! - Report counts, errors and warnings plus the plan to execute later.
//!
//! # Invariants
//! - Building a preview never writes to the store.
//! - Progress starts at `(0, total)` and ticks once per record, in the
//!   order entries, todos, sticky notes.

use crate::import::parsers::parse_source;
use crate::import::reconcile::{EntryDecision, ReconciliationState, TodoDecision};
use crate::import::types::{ImportPlan, ImportPreview, ImportSource, ParsedImport, PreviewTotals};
use crate::repo::journal_repo::{JournalReader, RepoResult};
use log::{error, info};
use std::time::Instant;

/// Builds previews against a read-only journal view.
pub struct PreviewBuilder<'a, R: JournalReader + ?Sized> {
    reader: &'a R,
}

impl<'a, R: JournalReader + ?Sized> PreviewBuilder<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self { reader }
    }

    /// Parses `source` and classifies its records.
    ///
    /// # Errors
    /// Returns the repository error when the current state cannot be read.
    /// Malformed source data is reported inside the preview instead.
    pub fn build(
        &self,
        source: &ImportSource,
        on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> RepoResult<ImportPreview> {
        let parsed = parse_source(source);
        self.build_parsed(source.clone(), parsed, on_progress)
    }

    /// Classifies already parsed records for `source`.
    pub fn build_parsed(
        &self,
        source: ImportSource,
        parsed: ParsedImport,
        mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> RepoResult<ImportPreview> {
        let started_at = Instant::now();
        let mut state = ReconciliationState::load(self.reader).map_err(|err| {
            error!(
                "event=import_preview module=import status=error format={} error_code=state_load_failed error={err}",
                parsed.format
            );
            err
        })?;

        let records = &parsed.records;
        let total = records.total();
        let mut current = 0usize;
        let mut tick = |current: usize| {
            if let Some(callback) = on_progress.as_deref_mut() {
                callback(current, total);
            }
        };
        tick(current);

        let mut totals = PreviewTotals::default();
        for entry in &records.entries {
            match state.reconcile_entry(entry) {
                EntryDecision::Created { .. } => totals.entries_to_create += 1,
                EntryDecision::Appended { .. } => totals.entries_to_append += 1,
                EntryDecision::Duplicate => totals.duplicates_skipped += 1,
            }
            current += 1;
            tick(current);
        }
        for todo in &records.todos {
            match state.reconcile_todo(todo) {
                TodoDecision::Created { .. } => totals.todos_to_create += 1,
                TodoDecision::Duplicate => totals.duplicates_skipped += 1,
            }
            current += 1;
            tick(current);
        }
        for note in &records.sticky_notes {
            if state.reconcile_sticky_note(note) {
                totals.sticky_notes_to_create += 1;
            } else {
                totals.duplicates_skipped += 1;
            }
            current += 1;
            tick(current);
        }

        info!(
            "event=import_preview module=import status=ok format={} records={} entries_to_create={} entries_to_append={} todos_to_create={} sticky_notes_to_create={} duplicates_skipped={} errors={} warnings={} duration_ms={}",
            parsed.format,
            total,
            totals.entries_to_create,
            totals.entries_to_append,
            totals.todos_to_create,
            totals.sticky_notes_to_create,
            totals.duplicates_skipped,
            parsed.errors.len(),
            parsed.warnings.len(),
            started_at.elapsed().as_millis()
        );

        Ok(ImportPreview {
            format: parsed.format,
            totals,
            errors: parsed.errors,
            warnings: parsed.warnings,
            plan: ImportPlan {
                source,
                records: parsed.records,
            },
        })
    }
}
