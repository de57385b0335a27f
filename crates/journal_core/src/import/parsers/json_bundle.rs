//! JSON bundle parser.
//!
//! Accepts one object with `schemaVersion` (must be `1`) and the optional
//! arrays `entries`, `todos` and `stickyNotes`. Every element is validated on
//! its own; an invalid element is skipped and reported, never fatal.

use super::Diagnostics;
use crate::import::normalize::{
    is_valid_date_string, normalize_content, normalize_date, normalize_scheduled_time,
    parse_completed_value,
};
use crate::import::types::{
    CanonicalRecords, EntryRecord, ImportFormat, ParsedImport, StickyNoteRecord, TodoRecord,
};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

const SUPPORTED_SCHEMA_VERSION: f64 = 1.0;
const TOP_LEVEL_KEYS: &[&str] = &["schemaVersion", "entries", "todos", "stickyNotes"];
const ENTRY_KEYS: &[&str] = &["date", "content"];
const TODO_KEYS: &[&str] = &["date", "content", "completed", "scheduledTime"];
const STICKY_NOTE_KEYS: &[&str] = &["date", "content"];

type JsonObject = Map<String, Value>;

/// Parses a bundle file, or `preloaded` text when the host already read it.
pub fn parse_json_bundle(path: &Path, preloaded: Option<&str>) -> ParsedImport {
    let text = match preloaded {
        Some(text) => Cow::Borrowed(text),
        None => match fs::read_to_string(path) {
            Ok(text) => Cow::Owned(text),
            Err(err) => return unreadable(err),
        },
    };
    parse_json_bundle_str(&text)
}

/// Parses bundle text.
pub fn parse_json_bundle_str(text: &str) -> ParsedImport {
    let root = match serde_json::from_str::<Value>(text) {
        Ok(root) => root,
        Err(err) => return unreadable(err),
    };

    let mut diagnostics = Diagnostics::default();
    let Value::Object(root) = root else {
        diagnostics.error("JSON bundle root must be an object");
        return diagnostics.finish(ImportFormat::JsonBundle, CanonicalRecords::default());
    };

    for key in root.keys() {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            diagnostics.warn(format!("Unknown top-level field \"{key}\" ignored"));
        }
    }

    let schema_ok = root
        .get("schemaVersion")
        .and_then(Value::as_f64)
        .is_some_and(|version| version == SUPPORTED_SCHEMA_VERSION);
    if !schema_ok {
        diagnostics.error("schemaVersion must be 1");
    }

    let records = CanonicalRecords {
        entries: parse_array(&root, "entries", ENTRY_KEYS, &mut diagnostics, parse_entry),
        todos: parse_array(&root, "todos", TODO_KEYS, &mut diagnostics, parse_todo),
        sticky_notes: parse_array(
            &root,
            "stickyNotes",
            STICKY_NOTE_KEYS,
            &mut diagnostics,
            parse_sticky_note,
        ),
    };
    diagnostics.finish(ImportFormat::JsonBundle, records)
}

fn unreadable(err: impl std::fmt::Display) -> ParsedImport {
    let mut diagnostics = Diagnostics::default();
    diagnostics.error(format!("Unable to read or parse JSON file: {err}"));
    diagnostics.finish(ImportFormat::JsonBundle, CanonicalRecords::default())
}

fn parse_array<T>(
    root: &JsonObject,
    key: &str,
    allowed_keys: &[&str],
    diagnostics: &mut Diagnostics,
    parse_item: fn(&str, &JsonObject, &mut Diagnostics) -> Option<T>,
) -> Vec<T> {
    let Some(raw) = root.get(key) else {
        return Vec::new();
    };
    let Some(items) = raw.as_array() else {
        diagnostics.error(format!("{key} must be an array"));
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let source = format!("{key}[{index}]");
        let Some(object) = item.as_object() else {
            diagnostics.error(format!("{source}: must be an object"));
            continue;
        };
        for field in object.keys() {
            if !allowed_keys.contains(&field.as_str()) {
                diagnostics.warn(format!("{source}: unknown field \"{field}\" ignored"));
            }
        }
        if let Some(record) = parse_item(&source, object, diagnostics) {
            parsed.push(record);
        }
    }
    parsed
}

fn parse_entry(source: &str, object: &JsonObject, diagnostics: &mut Diagnostics) -> Option<EntryRecord> {
    let (date, content) = date_and_content(source, object, diagnostics)?;
    Some(EntryRecord { date, content })
}

fn parse_todo(source: &str, object: &JsonObject, diagnostics: &mut Diagnostics) -> Option<TodoRecord> {
    let (date, content) = date_and_content(source, object, diagnostics)?;

    let completed = match object.get("completed") {
        None => false,
        Some(raw) => match parse_completed_value(raw) {
            Some(completed) => completed,
            None => {
                diagnostics.error(format!(
                    "{source}: completed must be one of true/false/1/0/yes/no/x"
                ));
                return None;
            }
        },
    };

    let scheduled_time = match object.get("scheduledTime") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => normalize_scheduled_time(Some(raw)),
        Some(_) => {
            diagnostics.error(format!("{source}: scheduledTime must be a string or null"));
            return None;
        }
    };

    Some(TodoRecord {
        date,
        content,
        completed,
        scheduled_time,
    })
}

fn parse_sticky_note(
    source: &str,
    object: &JsonObject,
    diagnostics: &mut Diagnostics,
) -> Option<StickyNoteRecord> {
    let (date, content) = date_and_content(source, object, diagnostics)?;
    Some(StickyNoteRecord { date, content })
}

fn date_and_content(
    source: &str,
    object: &JsonObject,
    diagnostics: &mut Diagnostics,
) -> Option<(String, String)> {
    let raw_date = display_value(object.get("date"));
    let date = normalize_date(&raw_date);
    if !is_valid_date_string(&date) {
        diagnostics.error(format!(
            "{source}: invalid date \"{raw_date}\" (expected YYYY-MM-DD)"
        ));
        return None;
    }

    let Some(Value::String(raw_content)) = object.get("content") else {
        diagnostics.error(format!("{source}: content must be a string"));
        return None;
    };
    let content = normalize_content(raw_content);
    if content.is_empty() {
        diagnostics.error(format!("{source}: content cannot be empty"));
        return None;
    }

    Some((date, content))
}

/// Text form of a scalar as shown in error messages. Absent and `null` are empty.
fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_json_bundle_str;

    #[test]
    fn non_object_root_is_rejected() {
        let parsed = parse_json_bundle_str("[1, 2]");
        assert_eq!(parsed.errors, vec!["JSON bundle root must be an object"]);
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn malformed_json_reports_single_error() {
        let parsed = parse_json_bundle_str("{ not json");
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].starts_with("Unable to read or parse JSON file: "));
    }

    #[test]
    fn numeric_date_is_echoed_in_error() {
        let parsed = parse_json_bundle_str(
            r#"{"schemaVersion": 1, "entries": [{"date": 20250101, "content": "x"}]}"#,
        );
        assert_eq!(
            parsed.errors,
            vec!["entries[0]: invalid date \"20250101\" (expected YYYY-MM-DD)"]
        );
    }

    #[test]
    fn schema_version_accepts_float_one() {
        let parsed = parse_json_bundle_str(r#"{"schemaVersion": 1.0}"#);
        assert!(parsed.errors.is_empty());
    }
}
