//! Journal entity model: entries, todos and sticky notes.
//!
//! # Invariants
//! - At most one `Entry` per date is expected; readers track the first one.
//! - `Todo::position` is non-negative and increasing within one date.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque row identifier. Rows created by the core use random UUIDs, but
/// rows written by other app paths are accepted as-is.
pub type RecordId = String;

/// Generates a fresh identifier for a row created by the core.
pub fn new_record_id() -> RecordId {
    Uuid::new_v4().to_string()
}

/// One journal page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: RecordId,
    pub date: String,
    pub content: String,
}

/// A task scoped to one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: RecordId,
    pub date: String,
    pub content: String,
    /// Free-form time label such as `9:00 AM`.
    pub scheduled_time: Option<String>,
    pub completed: bool,
    /// Display order within `date`.
    pub position: i64,
}

/// A free-form note pinned to one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickyNote {
    pub id: RecordId,
    pub date: String,
    pub content: String,
}

/// Highest existing todo position for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoPositionMax {
    pub date: String,
    pub max_position: i64,
}
