//! Journal repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load the current entries/todos/sticky notes snapshot for reconciliation.
//! - Translate logical journal writes into parameterized SQL statements.
//! - Submit write lists to the transactional batch executor.
//!
//! # Invariants
//! - Read paths return rows in a stable order (`created_at ASC, id ASC`).
//! - Read paths reject invalid persisted state instead of masking it.
//! - Write statements bind every value; nothing is interpolated.

use crate::db::{execute_batch, BatchResult, BusyRetryPolicy, DbError, SqlStatement};
use crate::model::journal::{Entry, RecordId, StickyNote, Todo, TodoPositionMax};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const INSERT_ENTRY_SQL: &str = "INSERT INTO entries (id, date, content) VALUES (?1, ?2, ?3);";
const UPDATE_ENTRY_CONTENT_SQL: &str = "UPDATE entries
     SET
        content = ?2,
        updated_at = (strftime('%s', 'now') * 1000)
     WHERE id = ?1;";
const INSERT_TODO_SQL: &str = "INSERT INTO todos (
        id,
        date,
        content,
        scheduled_time,
        completed,
        position
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);";
const INSERT_STICKY_NOTE_SQL: &str =
    "INSERT INTO sticky_notes (id, date, content) VALUES (?1, ?2, ?3);";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for journal snapshot reads.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted journal data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One logical write emitted by the import execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalWrite {
    InsertEntry(Entry),
    UpdateEntryContent { id: RecordId, content: String },
    InsertTodo(Todo),
    InsertStickyNote(StickyNote),
}

impl JournalWrite {
    /// Short label used in logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsertEntry(_) => "insert_entry",
            Self::UpdateEntryContent { .. } => "update_entry_content",
            Self::InsertTodo(_) => "insert_todo",
            Self::InsertStickyNote(_) => "insert_sticky_note",
        }
    }

    /// Builds the parameterized SQL statement for this write.
    ///
    /// Content updates must hit an existing row; otherwise the batch fails.
    pub fn to_statement(&self) -> SqlStatement {
        match self {
            Self::InsertEntry(entry) => SqlStatement::new(
                INSERT_ENTRY_SQL,
                vec![
                    text(&entry.id),
                    text(&entry.date),
                    text(&entry.content),
                ],
            ),
            Self::UpdateEntryContent { id, content } => {
                SqlStatement::new(UPDATE_ENTRY_CONTENT_SQL, vec![text(id), text(content)])
                    .requiring_change()
            }
            Self::InsertTodo(todo) => SqlStatement::new(
                INSERT_TODO_SQL,
                vec![
                    text(&todo.id),
                    text(&todo.date),
                    text(&todo.content),
                    todo.scheduled_time.as_deref().map_or(Value::Null, text),
                    Value::Integer(bool_to_int(todo.completed)),
                    Value::Integer(todo.position),
                ],
            ),
            Self::InsertStickyNote(note) => SqlStatement::new(
                INSERT_STICKY_NOTE_SQL,
                vec![text(&note.id), text(&note.date), text(&note.content)],
            ),
        }
    }
}

/// Read-only access to the journal state the import pipeline reconciles against.
pub trait JournalReader {
    /// All entries, oldest first.
    fn load_entries(&self) -> RepoResult<Vec<Entry>>;
    /// All todos, oldest first.
    fn load_todos(&self) -> RepoResult<Vec<Todo>>;
    /// All sticky notes, oldest first.
    fn load_sticky_notes(&self) -> RepoResult<Vec<StickyNote>>;
    /// Highest todo position per date.
    fn load_todo_max_positions(&self) -> RepoResult<Vec<TodoPositionMax>>;
}

/// Transactional writer: applies one ordered write list atomically.
pub trait BatchExecutor {
    fn execute_batch(&self, writes: &[JournalWrite]) -> BatchResult<()>;
}

/// SQLite-backed journal repository.
pub struct SqliteJournalRepository<'conn> {
    conn: &'conn Connection,
    retry: BusyRetryPolicy,
}

impl<'conn> SqliteJournalRepository<'conn> {
    /// Creates a repository over a migrated connection with default busy retry.
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_retry_policy(conn, BusyRetryPolicy::default())
    }

    pub fn with_retry_policy(conn: &'conn Connection, retry: BusyRetryPolicy) -> Self {
        Self { conn, retry }
    }
}

impl JournalReader for SqliteJournalRepository<'_> {
    fn load_entries(&self) -> RepoResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, content
             FROM entries
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(Entry {
                id: row.get("id")?,
                date: row.get("date")?,
                content: row.get("content")?,
            });
        }
        Ok(entries)
    }

    fn load_todos(&self) -> RepoResult<Vec<Todo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, content, scheduled_time, completed, position
             FROM todos
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut todos = Vec::new();
        while let Some(row) = rows.next()? {
            todos.push(parse_todo_row(row)?);
        }
        Ok(todos)
    }

    fn load_sticky_notes(&self) -> RepoResult<Vec<StickyNote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, content
             FROM sticky_notes
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(StickyNote {
                id: row.get("id")?,
                date: row.get("date")?,
                content: row.get("content")?,
            });
        }
        Ok(notes)
    }

    fn load_todo_max_positions(&self) -> RepoResult<Vec<TodoPositionMax>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, MAX(position) AS max_position
             FROM todos
             GROUP BY date
             ORDER BY date ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut maxima = Vec::new();
        while let Some(row) = rows.next()? {
            maxima.push(TodoPositionMax {
                date: row.get("date")?,
                max_position: row.get::<_, Option<i64>>("max_position")?.unwrap_or(-1),
            });
        }
        Ok(maxima)
    }
}

impl BatchExecutor for SqliteJournalRepository<'_> {
    fn execute_batch(&self, writes: &[JournalWrite]) -> BatchResult<()> {
        let statements = writes
            .iter()
            .map(JournalWrite::to_statement)
            .collect::<Vec<_>>();
        execute_batch(self.conn, &self.retry, &statements)
    }
}

fn parse_todo_row(row: &Row<'_>) -> RepoResult<Todo> {
    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` in todos.completed"
            )));
        }
    };

    Ok(Todo {
        id: row.get("id")?,
        date: row.get("date")?,
        content: row.get("content")?,
        scheduled_time: row.get("scheduled_time")?,
        completed,
        position: row.get("position")?,
    })
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
