//! Data contracts shared by parsers, preview and execution.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// External representation an import is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    /// One JSON file with `schemaVersion`, `entries`, `todos`, `stickyNotes`.
    JsonBundle,
    /// A directory with `entries.csv`, `todos.csv` and/or `sticky_notes.csv`.
    CsvFolder,
}

impl ImportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonBundle => "json_bundle",
            Self::CsvFolder => "csv_folder",
        }
    }

    /// Parses the wire label used by host callers.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json_bundle" => Some(Self::JsonBundle),
            "csv_folder" => Some(Self::CsvFolder),
            _ => None,
        }
    }
}

impl Display for ImportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSource {
    pub format: ImportFormat,
    /// File path for bundles, directory path for CSV folders.
    pub path: PathBuf,
    /// Preloaded bundle text. When set, `path` is not read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ImportSource {
    pub fn json_bundle(path: impl Into<PathBuf>) -> Self {
        Self {
            format: ImportFormat::JsonBundle,
            path: path.into(),
            content: None,
        }
    }

    /// Bundle whose text the host already read.
    pub fn json_bundle_text(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            format: ImportFormat::JsonBundle,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn csv_folder(path: impl Into<PathBuf>) -> Self {
        Self {
            format: ImportFormat::CsvFolder,
            path: path.into(),
            content: None,
        }
    }
}

/// Canonical journal page record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub date: String,
    pub content: String,
}

/// Canonical todo record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub date: String,
    pub content: String,
    pub completed: bool,
    pub scheduled_time: Option<String>,
}

/// Canonical sticky note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickyNoteRecord {
    pub date: String,
    pub content: String,
}

/// Format-independent record set, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecords {
    pub entries: Vec<EntryRecord>,
    pub todos: Vec<TodoRecord>,
    pub sticky_notes: Vec<StickyNoteRecord>,
}

impl CanonicalRecords {
    /// Number of records across all three kinds.
    pub fn total(&self) -> usize {
        self.entries.len() + self.todos.len() + self.sticky_notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Parser output. Records may be partial whenever `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImport {
    pub format: ImportFormat,
    pub records: CanonicalRecords,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// What execution replays: the source plus the parsed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPlan {
    pub source: ImportSource,
    pub records: CanonicalRecords,
}

/// Dry-run outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTotals {
    pub entries_to_create: usize,
    pub entries_to_append: usize,
    pub todos_to_create: usize,
    pub sticky_notes_to_create: usize,
    pub duplicates_skipped: usize,
}

/// Dry-run result shown to the user before confirming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPreview {
    pub format: ImportFormat,
    pub totals: PreviewTotals,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub plan: ImportPlan,
}

impl ImportPreview {
    /// Whether the preview may be executed.
    pub fn is_executable(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Execution outcome.
///
/// On failure the four creation/append counters are zero, `errors` holds one
/// message, and `write_batches_committed` tells how many earlier batches
/// stayed applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub entries_created: usize,
    pub entries_appended: usize,
    pub todos_created: usize,
    pub sticky_notes_created: usize,
    pub duplicates_skipped: usize,
    pub write_batches_committed: usize,
    pub errors: Vec<String>,
}

impl ExecutionResult {
    /// Result for a run that never touched the store.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Sum of rows created or appended.
    pub fn changed_count(&self) -> usize {
        self.entries_created + self.entries_appended + self.todos_created + self.sticky_notes_created
    }
}
