//! FFI use-case API for the import wizard.
//!
//! # Responsibility
//! - Expose the preview/execute import flow to Dart via FRB.
//! - Keep previews in a process-wide session map between the two calls.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - A preview id is consumed by its first execution attempt.
//! - At most `MAX_PREVIEW_SESSIONS` previews are kept; the oldest goes first.
//! - Progress is reported to the log only; UI polling is out of this layer.

use journal_core::db::open_db;
use journal_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ExecutionResult,
    ImportConfig, ImportFormat, ImportPreview, ImportProgress, ImportService, ImportSource,
    ThreadYield,
};
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use uuid::Uuid;

const JOURNAL_DB_FILE_NAME: &str = "journal.sqlite3";
const JOURNAL_DB_PATH_ENV: &str = "JOURNAL_DB_PATH";

static JOURNAL_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
/// Previews kept at once; inserting past this evicts the oldest.
const MAX_PREVIEW_SESSIONS: usize = 8;

static PREVIEW_SESSIONS: Lazy<Mutex<PreviewSessions>> =
    Lazy::new(|| Mutex::new(PreviewSessions::new(MAX_PREVIEW_SESSIONS)));

/// Bounded preview store, oldest evicted first.
struct PreviewSessions {
    capacity: usize,
    order: VecDeque<String>,
    previews: HashMap<String, ImportPreview>,
}

impl PreviewSessions {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            previews: HashMap::new(),
        }
    }

    fn insert(&mut self, preview_id: String, preview: ImportPreview) {
        while self.previews.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.previews.remove(&oldest).is_some() {
                debug!("event=import_preview_evicted module=ffi status=ok");
            }
        }
        self.order.push_back(preview_id.clone());
        self.previews.insert(preview_id, preview);
    }

    fn take(&mut self, preview_id: &str) -> Option<ImportPreview> {
        let preview = self.previews.remove(preview_id)?;
        self.order.retain(|id| id != preview_id);
        Some(preview)
    }
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and an error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Preview envelope returned to the import wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPreviewResponse {
    /// Whether the preview was built and may be executed.
    pub ok: bool,
    /// Session id to pass to [`import_execute`]; set whenever a preview was built.
    pub preview_id: Option<String>,
    pub entries_to_create: u32,
    pub entries_to_append: u32,
    pub todos_to_create: u32,
    pub sticky_notes_to_create: u32,
    pub duplicates_skipped: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Human-readable summary for the wizard.
    pub message: String,
}

impl ImportPreviewResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            preview_id: None,
            entries_to_create: 0,
            entries_to_append: 0,
            todos_to_create: 0,
            sticky_notes_to_create: 0,
            duplicates_skipped: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            message: message.into(),
        }
    }

    fn from_preview(preview_id: String, preview: &ImportPreview) -> Self {
        let totals = preview.totals;
        let ok = preview.is_executable();
        let message = if ok {
            format!(
                "Ready to import {} record(s); {} duplicate(s) will be skipped.",
                totals.entries_to_create
                    + totals.entries_to_append
                    + totals.todos_to_create
                    + totals.sticky_notes_to_create,
                totals.duplicates_skipped
            )
        } else {
            format!("Found {} problem(s) in the import source.", preview.errors.len())
        };
        Self {
            ok,
            preview_id: Some(preview_id),
            entries_to_create: to_u32(totals.entries_to_create),
            entries_to_append: to_u32(totals.entries_to_append),
            todos_to_create: to_u32(totals.todos_to_create),
            sticky_notes_to_create: to_u32(totals.sticky_notes_to_create),
            duplicates_skipped: to_u32(totals.duplicates_skipped),
            errors: preview.errors.clone(),
            warnings: preview.warnings.clone(),
            message,
        }
    }
}

/// Execution envelope returned to the import wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportExecuteResponse {
    pub ok: bool,
    pub entries_created: u32,
    pub entries_appended: u32,
    pub todos_created: u32,
    pub sticky_notes_created: u32,
    pub duplicates_skipped: u32,
    /// Write chunks that stayed committed, also after a failure.
    pub write_batches_committed: u32,
    pub errors: Vec<String>,
    pub message: String,
}

impl ImportExecuteResponse {
    fn from_result(result: &ExecutionResult) -> Self {
        let ok = result.is_success();
        let message = if ok {
            format!(
                "Imported {} record(s); skipped {} duplicate(s).",
                result.changed_count(),
                result.duplicates_skipped
            )
        } else {
            result
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "Import failed.".to_string())
        };
        Self {
            ok,
            entries_created: to_u32(result.entries_created),
            entries_appended: to_u32(result.entries_appended),
            todos_created: to_u32(result.todos_created),
            sticky_notes_created: to_u32(result.sticky_notes_created),
            duplicates_skipped: to_u32(result.duplicates_skipped),
            write_batches_committed: to_u32(result.write_batches_committed),
            errors: result.errors.clone(),
            message,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_result(&ExecutionResult::rejected(message))
    }
}

/// Builds an import preview and keeps it for a later [`import_execute`].
///
/// Input semantics:
/// - `format`: `json_bundle` or `csv_folder`.
/// - `path`: bundle file or CSV folder.
/// - `content`: optional bundle text already read by the host.
///
/// # FFI contract
/// - Sync call, DB-backed read-only execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn import_preview(
    format: String,
    path: String,
    content: Option<String>,
) -> ImportPreviewResponse {
    let Some(format) = ImportFormat::parse(&format) else {
        return ImportPreviewResponse::failure(format!(
            "import_preview failed: unsupported format `{}`; expected json_bundle|csv_folder",
            format.trim()
        ));
    };
    let source = ImportSource {
        format,
        path: PathBuf::from(path.trim()),
        content,
    };

    let conn = match open_db(resolve_journal_db_path()) {
        Ok(conn) => conn,
        Err(err) => {
            return ImportPreviewResponse::failure(format!("journal DB open failed: {err}"))
        }
    };
    let service = ImportService::for_connection(&conn, ImportConfig::default());
    let log_progress: &mut dyn FnMut(usize, usize) = &mut |current, total| {
        debug!("event=import_progress module=ffi phase=preview current={current} total={total}");
    };
    let preview = match service.build_preview(&source, Some(log_progress)) {
        Ok(preview) => preview,
        Err(err) => return ImportPreviewResponse::failure(format!("import_preview failed: {err}")),
    };

    let preview_id = Uuid::new_v4().to_string();
    let response = ImportPreviewResponse::from_preview(preview_id.clone(), &preview);
    preview_sessions().insert(preview_id, preview);
    response
}

/// Executes a preview returned by [`import_preview`].
///
/// # FFI contract
/// - Sync call, DB-backed execution; may block for large imports.
/// - The preview id is consumed even when execution fails.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn import_execute(preview_id: String) -> ImportExecuteResponse {
    let Some(preview) = preview_sessions().take(preview_id.trim()) else {
        warn!("event=import_execute module=ffi status=error error_code=unknown_preview");
        return ImportExecuteResponse::failure(format!(
            "import_execute failed: unknown preview id `{}`",
            preview_id.trim()
        ));
    };

    let conn = match open_db(resolve_journal_db_path()) {
        Ok(conn) => conn,
        Err(err) => {
            return ImportExecuteResponse::failure(format!("journal DB open failed: {err}"))
        }
    };
    let service = ImportService::for_connection(&conn, ImportConfig::default());
    let log_progress: &mut dyn FnMut(ImportProgress) = &mut |progress| {
        debug!(
            "event=import_progress module=ffi phase={} current={} total={}",
            progress.phase, progress.current, progress.total
        );
    };
    let result = service.execute_plan(&preview, Some(log_progress), &mut ThreadYield);
    ImportExecuteResponse::from_result(&result)
}

/// Drops a stored preview the user cancelled. Returns whether one existed.
#[flutter_rust_bridge::frb(sync)]
pub fn import_discard_preview(preview_id: String) -> bool {
    preview_sessions().take(preview_id.trim()).is_some()
}

fn preview_sessions() -> MutexGuard<'static, PreviewSessions> {
    PREVIEW_SESSIONS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn resolve_journal_db_path() -> PathBuf {
    JOURNAL_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(JOURNAL_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(JOURNAL_DB_FILE_NAME)
        })
        .clone()
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
