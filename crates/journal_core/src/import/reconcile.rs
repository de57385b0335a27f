//! In-memory reconciliation state shared by preview and execution.
//!
//! # Responsibility
//! - Snapshot existing journal rows into date maps and de-duplication sets.
//! - Classify canonical records as create, append or duplicate.
//!
//! # Invariants
//! - The state is owned by one run and mutated as records are classified,
//!   so later records in the same source see earlier decisions.
//! - Only the first entry per date (by `created_at`, `id`) is tracked.
//! - Todo positions grow by one per created todo, per date.

use crate::import::normalize::{
    append_imported_content, build_sticky_note_dedupe_key, build_todo_dedupe_key,
    extract_import_markers, generate_import_content_hash, normalize_content,
    sticky_note_dedupe_key, todo_dedupe_key,
};
use crate::import::types::{EntryRecord, StickyNoteRecord, TodoRecord};
use crate::model::journal::{new_record_id, RecordId};
use crate::repo::journal_repo::{JournalReader, RepoResult};
use log::warn;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, HashSet};

/// Tracked state of one existing (or newly created) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    pub id: RecordId,
    pub content: String,
    pub markers: HashSet<String>,
}

/// Classification of one entry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDecision {
    /// No entry for the date yet; insert a new one.
    Created { id: RecordId },
    /// Same content already present, or previously imported.
    Duplicate,
    /// Existing entry gets the record appended; `content` is the merged text.
    Appended { id: RecordId, content: String },
}

/// Classification of one todo record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoDecision {
    Created { position: i64 },
    Duplicate,
}

/// Mutable snapshot threaded through one preview or execution run.
#[derive(Debug, Default)]
pub struct ReconciliationState {
    entries_by_date: HashMap<String, EntryState>,
    todo_keys: HashSet<String>,
    sticky_note_keys: HashSet<String>,
    todo_max_position_by_date: HashMap<String, i64>,
}

impl ReconciliationState {
    /// Loads entries, todos and sticky notes from `reader`.
    pub fn load<R: JournalReader + ?Sized>(reader: &R) -> RepoResult<Self> {
        let mut state = Self::default();

        for entry in reader.load_entries()? {
            match state.entries_by_date.entry(entry.date) {
                MapEntry::Occupied(existing) => {
                    warn!(
                        "event=import_state module=import status=warn error_code=duplicate_entry_date date={} tracked_id={} ignored_id={}",
                        existing.key(),
                        existing.get().id,
                        entry.id
                    );
                }
                MapEntry::Vacant(slot) => {
                    let markers = extract_import_markers(&entry.content);
                    slot.insert(EntryState {
                        id: entry.id,
                        content: entry.content,
                        markers,
                    });
                }
            }
        }

        for todo in reader.load_todos()? {
            state.todo_keys.insert(todo_dedupe_key(
                &todo.date,
                &todo.content,
                todo.completed,
                todo.scheduled_time.as_deref(),
            ));
        }

        for note in reader.load_sticky_notes()? {
            state
                .sticky_note_keys
                .insert(sticky_note_dedupe_key(&note.date, &note.content));
        }

        Ok(state)
    }

    /// Same as [`Self::load`] plus the per-date maximum todo position.
    pub fn load_for_execution<R: JournalReader + ?Sized>(reader: &R) -> RepoResult<Self> {
        let mut state = Self::load(reader)?;
        for row in reader.load_todo_max_positions()? {
            state
                .todo_max_position_by_date
                .insert(row.date, row.max_position);
        }
        Ok(state)
    }

    pub fn entry_for_date(&self, date: &str) -> Option<&EntryState> {
        self.entries_by_date.get(date)
    }

    /// Classifies `record` and records the outcome in the snapshot.
    pub fn reconcile_entry(&mut self, record: &EntryRecord) -> EntryDecision {
        let Some(current) = self.entries_by_date.get_mut(&record.date) else {
            let id = new_record_id();
            self.entries_by_date.insert(
                record.date.clone(),
                EntryState {
                    id: id.clone(),
                    content: record.content.clone(),
                    markers: HashSet::new(),
                },
            );
            return EntryDecision::Created { id };
        };

        if normalize_content(&current.content) == record.content {
            return EntryDecision::Duplicate;
        }

        let content_hash = generate_import_content_hash(&record.content);
        if current.markers.contains(&content_hash) {
            return EntryDecision::Duplicate;
        }

        let merged = append_imported_content(&current.content, &record.content, &content_hash);
        current.content = merged.clone();
        current.markers.insert(content_hash);
        EntryDecision::Appended {
            id: current.id.clone(),
            content: merged,
        }
    }

    /// Classifies `record`; a created todo takes the next position for its date.
    pub fn reconcile_todo(&mut self, record: &TodoRecord) -> TodoDecision {
        if !self.todo_keys.insert(build_todo_dedupe_key(record)) {
            return TodoDecision::Duplicate;
        }

        let max_position = self
            .todo_max_position_by_date
            .entry(record.date.clone())
            .or_insert(-1);
        *max_position += 1;
        TodoDecision::Created {
            position: *max_position,
        }
    }

    /// Returns `true` when the note is new and has been recorded.
    pub fn reconcile_sticky_note(&mut self, record: &StickyNoteRecord) -> bool {
        self.sticky_note_keys
            .insert(build_sticky_note_dedupe_key(record))
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryDecision, ReconciliationState, TodoDecision};
    use crate::import::types::{EntryRecord, StickyNoteRecord, TodoRecord};

    fn entry(date: &str, content: &str) -> EntryRecord {
        EntryRecord {
            date: date.to_string(),
            content: content.to_string(),
        }
    }

    fn todo(date: &str, content: &str) -> TodoRecord {
        TodoRecord {
            date: date.to_string(),
            content: content.to_string(),
            completed: false,
            scheduled_time: None,
        }
    }

    #[test]
    fn second_entry_for_same_date_appends_then_dedupes() {
        let mut state = ReconciliationState::default();
        assert!(matches!(
            state.reconcile_entry(&entry("2025-01-01", "first")),
            EntryDecision::Created { .. }
        ));
        assert_eq!(
            state.reconcile_entry(&entry("2025-01-01", "first")),
            EntryDecision::Duplicate
        );

        let appended = state.reconcile_entry(&entry("2025-01-01", "second"));
        let EntryDecision::Appended { content, .. } = appended else {
            panic!("expected append, got {appended:?}");
        };
        assert!(content.starts_with("first\n\n---\n\n<!-- journal-import:"));
        assert!(content.ends_with("\nsecond"));

        assert_eq!(
            state.reconcile_entry(&entry("2025-01-01", "second")),
            EntryDecision::Duplicate
        );
        assert_eq!(
            state.entry_for_date("2025-01-01").map(|e| e.markers.len()),
            Some(1)
        );
    }

    #[test]
    fn todo_positions_start_at_zero_per_date() {
        let mut state = ReconciliationState::default();
        assert_eq!(
            state.reconcile_todo(&todo("2025-01-01", "a")),
            TodoDecision::Created { position: 0 }
        );
        assert_eq!(
            state.reconcile_todo(&todo("2025-01-01", "b")),
            TodoDecision::Created { position: 1 }
        );
        assert_eq!(
            state.reconcile_todo(&todo("2025-01-02", "a")),
            TodoDecision::Created { position: 0 }
        );
        assert_eq!(
            state.reconcile_todo(&todo("2025-01-01", " A ")),
            TodoDecision::Duplicate
        );
    }

    #[test]
    fn sticky_notes_dedupe_on_normalized_text() {
        let mut state = ReconciliationState::default();
        let note = StickyNoteRecord {
            date: "2025-01-01".to_string(),
            content: "Call mom".to_string(),
        };
        assert!(state.reconcile_sticky_note(&note));
        assert!(!state.reconcile_sticky_note(&StickyNoteRecord {
            content: "call   MOM".to_string(),
            ..note
        }));
    }
}
