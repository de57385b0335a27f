use journal_core::db::batch::BatchStage;
use journal_core::db::{open_db_in_memory, BatchError, BatchResult};
use journal_core::import::normalize::{build_import_marker, generate_import_content_hash};
use journal_core::import::{
    ExecutionEngine, ImportPhase, ImportPreview, ImportProgress, ImportSource, NoYield,
    YieldHook, INVALID_PREVIEW_MESSAGE,
};
use journal_core::model::journal::TodoPositionMax;
use journal_core::{
    BatchExecutor, Entry, ImportConfig, ImportService, JournalReader, JournalWrite, RepoResult,
    SqliteJournalRepository, StickyNote, Todo,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::cell::Cell;

fn preview_for(conn: &Connection, bundle: Value) -> ImportPreview {
    let service = ImportService::new(SqliteJournalRepository::new(conn));
    service
        .build_preview(
            &ImportSource::json_bundle_text("bundle.json", bundle.to_string()),
            None,
        )
        .unwrap()
}

fn execute(conn: &Connection, preview: &ImportPreview) -> journal_core::ExecutionResult {
    ImportService::new(SqliteJournalRepository::new(conn)).execute_plan(preview, None, &mut NoYield)
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn todo_positions(conn: &Connection, date: &str) -> Vec<(String, i64)> {
    let mut stmt = conn
        .prepare("SELECT content, position FROM todos WHERE date = ?1 ORDER BY position ASC;")
        .unwrap();
    stmt.query_map([date], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn sticky_bundle(count: usize) -> Value {
    let notes = (0..count)
        .map(|index| json!({"date": "2025-03-01", "content": format!("note {index}")}))
        .collect::<Vec<_>>();
    json!({"schemaVersion": 1, "stickyNotes": notes})
}

#[test]
fn second_execution_of_same_preview_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO entries (id, date, content) VALUES ('e1', '2025-01-01', 'Existing day');",
        [],
    )
    .unwrap();
    let preview = preview_for(
        &conn,
        json!({
            "schemaVersion": 1,
            "entries": [{"date": "2025-01-01", "content": "Imported block"}],
            "todos": [{"date": "2025-01-01", "content": "Water plants", "completed": false}],
            "stickyNotes": [{"date": "2025-01-01", "content": "Pinned"}]
        }),
    );

    let first = execute(&conn, &preview);
    assert!(first.is_success(), "{:?}", first.errors);
    assert_eq!(first.entries_created, 0);
    assert_eq!(first.entries_appended, 1);
    assert_eq!(first.todos_created, 1);
    assert_eq!(first.sticky_notes_created, 1);
    assert_eq!(first.write_batches_committed, 1);

    let content: String = conn
        .query_row("SELECT content FROM entries WHERE id = 'e1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    let marker = build_import_marker(&generate_import_content_hash("Imported block"));
    assert_eq!(
        content,
        format!("Existing day\n\n---\n\n{marker}\nImported block")
    );

    let second = execute(&conn, &preview);
    assert!(second.is_success());
    assert_eq!(second.changed_count(), 0);
    assert!(second.duplicates_skipped >= 3);
    assert_eq!(second.write_batches_committed, 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM entries;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM todos;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM sticky_notes;"), 1);
}

#[test]
fn new_todos_continue_existing_positions_in_source_order() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO todos (id, date, content, completed, position) VALUES
            ('t0', '2025-01-01', 'zero', 0, 0),
            ('t1', '2025-01-01', 'one', 0, 1),
            ('t2', '2025-01-01', 'two', 1, 2);",
    )
    .unwrap();
    let preview = preview_for(
        &conn,
        json!({
            "schemaVersion": 1,
            "todos": [
                {"date": "2025-01-01", "content": "three"},
                {"date": "2025-01-02", "content": "other day"},
                {"date": "2025-01-01", "content": "four", "scheduledTime": "18:00"}
            ]
        }),
    );

    let result = execute(&conn, &preview);

    assert_eq!(result.todos_created, 3);
    assert_eq!(
        todo_positions(&conn, "2025-01-01"),
        vec![
            ("zero".to_string(), 0),
            ("one".to_string(), 1),
            ("two".to_string(), 2),
            ("three".to_string(), 3),
            ("four".to_string(), 4),
        ]
    );
    assert_eq!(
        todo_positions(&conn, "2025-01-02"),
        vec![("other day".to_string(), 0)]
    );
}

#[test]
fn failing_write_rolls_back_chunk_and_zeroes_counters() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO sticky_notes (id, date, content) VALUES ('s1', '2025-01-01', 'Known');
         CREATE TRIGGER reject_boom BEFORE INSERT ON todos
         WHEN NEW.content = 'boom'
         BEGIN
             SELECT RAISE(ABORT, 'boom rejected');
         END;",
    )
    .unwrap();
    let preview = preview_for(
        &conn,
        json!({
            "schemaVersion": 1,
            "entries": [{"date": "2025-01-05", "content": "Fresh"}],
            "todos": [
                {"date": "2025-01-05", "content": "fine"},
                {"date": "2025-01-05", "content": "boom"}
            ],
            "stickyNotes": [{"date": "2025-01-01", "content": "known"}]
        }),
    );

    let result = execute(&conn, &preview);

    assert_eq!(result.entries_created, 0);
    assert_eq!(result.entries_appended, 0);
    assert_eq!(result.todos_created, 0);
    assert_eq!(result.sticky_notes_created, 0);
    assert_eq!(result.duplicates_skipped, 1);
    assert_eq!(result.write_batches_committed, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Import failed: write batch 1 of 1 failed"));
    assert!(result.errors[0].contains("boom rejected"));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM todos;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM entries;"), 0);
}

#[test]
fn earlier_chunks_stay_committed_when_a_later_chunk_fails() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_note_4 BEFORE INSERT ON sticky_notes
         WHEN NEW.content = 'note 4'
         BEGIN
             SELECT RAISE(ABORT, 'note 4 rejected');
         END;",
    )
    .unwrap();
    let preview = preview_for(&conn, sticky_bundle(5));
    let config = ImportConfig {
        write_chunk_size: 2,
        ..ImportConfig::default()
    };
    let repo = SqliteJournalRepository::new(&conn);

    let result = ExecutionEngine::with_config(&repo, &repo, config).execute(
        &preview,
        None,
        &mut NoYield,
    );

    assert_eq!(result.sticky_notes_created, 0);
    assert_eq!(result.write_batches_committed, 2);
    assert!(result.errors[0].contains("write batch 3 of 3 failed"));
    assert!(result.errors[0].contains("2 write batch(es) committed"));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM sticky_notes;"), 4);
}

#[test]
fn previously_imported_block_is_detected_by_marker() {
    let conn = open_db_in_memory().unwrap();
    let hash = generate_import_content_hash("Imported block");
    conn.execute(
        "INSERT INTO entries (id, date, content) VALUES ('e1', '2025-01-01', ?1);",
        [format!(
            "Edited by hand\n\n---\n\n<!-- journal-import:{} -->\nImported block, then edited",
            hash.to_uppercase()
        )],
    )
    .unwrap();
    let preview = preview_for(
        &conn,
        json!({
            "schemaVersion": 1,
            "entries": [{"date": "2025-01-01", "content": "Imported block"}]
        }),
    );
    assert_eq!(preview.totals.duplicates_skipped, 1);

    let result = execute(&conn, &preview);

    assert_eq!(result.entries_appended, 0);
    assert_eq!(result.duplicates_skipped, 1);
}

#[test]
fn preview_with_errors_is_rejected_before_store_access() {
    let conn = open_db_in_memory().unwrap();
    let preview = preview_for(&conn, json!({"schemaVersion": 3}));
    assert!(!preview.is_executable());

    let result = ExecutionEngine::new(&UnreachableStore, &UnreachableStore).execute(
        &preview,
        None,
        &mut NoYield,
    );

    assert_eq!(result.errors, vec![INVALID_PREVIEW_MESSAGE]);
    assert_eq!(result.changed_count(), 0);
    assert_eq!(result.duplicates_skipped, 0);
}

#[test]
fn execution_reloads_state_instead_of_trusting_preview() {
    let conn = open_db_in_memory().unwrap();
    let preview = preview_for(
        &conn,
        json!({
            "schemaVersion": 1,
            "todos": [{"date": "2025-01-01", "content": "Stretch"}]
        }),
    );
    assert_eq!(preview.totals.todos_to_create, 1);
    conn.execute(
        "INSERT INTO todos (id, date, content, completed, position)
         VALUES ('manual', '2025-01-01', 'stretch', 0, 0);",
        [],
    )
    .unwrap();

    let result = execute(&conn, &preview);

    assert_eq!(result.todos_created, 0);
    assert_eq!(result.duplicates_skipped, 1);
}

#[test]
fn injected_writer_failure_is_reported_with_committed_batches() {
    let conn = open_db_in_memory().unwrap();
    let preview = preview_for(&conn, sticky_bundle(3));
    let repo = SqliteJournalRepository::new(&conn);
    let writer = FailOnCall {
        inner: &repo,
        fail_on: 2,
        calls: Cell::new(0),
    };
    let config = ImportConfig {
        write_chunk_size: 1,
        ..ImportConfig::default()
    };

    let result =
        ExecutionEngine::with_config(&repo, &writer, config).execute(&preview, None, &mut NoYield);

    assert_eq!(writer.calls.get(), 2);
    assert_eq!(result.write_batches_committed, 1);
    assert_eq!(result.sticky_notes_created, 0);
    assert!(result.errors[0].contains("write batch 2 of 3 failed"));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM sticky_notes;"), 1);
}

#[test]
fn progress_covers_processing_then_one_tick_per_chunk() {
    let conn = open_db_in_memory().unwrap();
    let preview = preview_for(&conn, sticky_bundle(5));
    let repo = SqliteJournalRepository::new(&conn);
    let config = ImportConfig {
        write_chunk_size: 2,
        yield_every: 2,
        ..ImportConfig::default()
    };
    let mut ticks = Vec::new();
    let mut record_tick = |progress: ImportProgress| ticks.push(progress);
    let mut scheduler = CountingYield::default();

    let result = ExecutionEngine::with_config(&repo, &repo, config).execute(
        &preview,
        Some(&mut record_tick),
        &mut scheduler,
    );

    assert!(result.is_success());
    assert_eq!(result.write_batches_committed, 3);
    assert_eq!(scheduler.yields, 2);

    let processing = ticks
        .iter()
        .filter(|tick| tick.phase == ImportPhase::Processing)
        .map(|tick| (tick.current, tick.total))
        .collect::<Vec<_>>();
    assert_eq!(
        processing,
        vec![(0, 5), (1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]
    );
    let writing = ticks
        .iter()
        .filter(|tick| tick.phase == ImportPhase::Writing)
        .map(|tick| (tick.current, tick.total))
        .collect::<Vec<_>>();
    assert_eq!(writing, vec![(5, 8), (6, 8), (7, 8), (8, 8)]);
}

#[derive(Default)]
struct CountingYield {
    yields: usize,
}

impl YieldHook for CountingYield {
    fn yield_now(&mut self) {
        self.yields += 1;
    }
}

/// Store that must never be touched.
struct UnreachableStore;

impl JournalReader for UnreachableStore {
    fn load_entries(&self) -> RepoResult<Vec<Entry>> {
        panic!("store must not be read")
    }

    fn load_todos(&self) -> RepoResult<Vec<Todo>> {
        panic!("store must not be read")
    }

    fn load_sticky_notes(&self) -> RepoResult<Vec<StickyNote>> {
        panic!("store must not be read")
    }

    fn load_todo_max_positions(&self) -> RepoResult<Vec<TodoPositionMax>> {
        panic!("store must not be read")
    }
}

impl BatchExecutor for UnreachableStore {
    fn execute_batch(&self, _writes: &[JournalWrite]) -> BatchResult<()> {
        panic!("store must not be written")
    }
}

/// Delegates to a real writer but fails the `fail_on`-th call (1-based).
struct FailOnCall<'a> {
    inner: &'a SqliteJournalRepository<'a>,
    fail_on: usize,
    calls: Cell<usize>,
}

impl BatchExecutor for FailOnCall<'_> {
    fn execute_batch(&self, writes: &[JournalWrite]) -> BatchResult<()> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call == self.fail_on {
            return Err(BatchError::Unchanged {
                stage: BatchStage::Commit,
            });
        }
        self.inner.execute_batch(writes)
    }
}
