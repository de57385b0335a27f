//! Pure normalization helpers for import reconciliation.
//!
//! # Responsibility
//! - Canonicalize dates, content and boolean-like values from any source.
//! - Build de-duplication keys and idempotency markers.
//!
//! # Invariants
//! - Every function here is total and free of I/O.
//! - De-duplication keys are compared in memory only and never persisted.
//! - Import markers are invisible when content is rendered as markdown.

use crate::import::types::{StickyNoteRecord, TodoRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use time::{Date, Month};

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("valid date regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static IMPORT_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!--\s*journal-import:([0-9a-fA-F]+)\s*-->").expect("valid marker regex")
});

/// Joins key parts. Control character, so it never shows up in typed text.
const KEY_SEPARATOR: char = '\u{1f}';
const IMPORT_SEPARATOR: &str = "\n\n---\n\n";
const DJB2_SEED: u32 = 5381;
/// Earliest accepted year; two-digit years are rejected.
const MIN_DATE_YEAR: i32 = 100;

/// Converts CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n")
}

/// Trims the raw date cell/field before validation.
pub fn normalize_date(value: &str) -> String {
    value.trim().to_string()
}

/// Returns true for strict `YYYY-MM-DD` strings naming a real calendar day.
pub fn is_valid_date_string(value: &str) -> bool {
    let Some(caps) = DATE_RE.captures(value) else {
        return false;
    };
    let (Ok(year), Ok(month), Ok(day)) = (
        caps[1].parse::<i32>(),
        caps[2].parse::<u8>(),
        caps[3].parse::<u8>(),
    ) else {
        return false;
    };
    if year < MIN_DATE_YEAR {
        return false;
    }
    let Ok(month) = Month::try_from(month) else {
        return false;
    };
    Date::from_calendar_date(year, month, day).is_ok()
}

/// Line-ending-normalized and trimmed content.
pub fn normalize_content(value: &str) -> String {
    normalize_line_endings(value).trim().to_string()
}

/// Trimmed scheduled time; blank becomes `None`.
pub fn normalize_scheduled_time(value: Option<&str>) -> Option<String> {
    let trimmed = normalize_line_endings(value?).trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses textual completed flags: `true/1/yes/x` and `false/0/no/""`.
///
/// Returns `None` for anything else; callers report it as a row error.
pub fn parse_completed_text(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "x" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Parses a JSON completed value: booleans, `1`/`0`, or text flags.
///
/// `null` counts as empty text and therefore `false`.
pub fn parse_completed_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_f64() {
            Some(n) if n == 1.0 => Some(true),
            Some(n) if n == 0.0 => Some(false),
            _ => None,
        },
        Value::String(text) => parse_completed_text(text),
        Value::Null => Some(false),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Comparison form of free text: trimmed, whitespace collapsed, lower-cased.
pub fn normalize_text_for_key(value: &str) -> String {
    let normalized = normalize_line_endings(value);
    WHITESPACE_RE
        .replace_all(normalized.trim(), " ")
        .to_lowercase()
}

/// De-duplication key for a todo given its significant fields.
pub fn todo_dedupe_key(
    date: &str,
    content: &str,
    completed: bool,
    scheduled_time: Option<&str>,
) -> String {
    let completed = if completed { "1" } else { "0" };
    join_key(&[
        date,
        &normalize_text_for_key(content),
        completed,
        &normalize_text_for_key(scheduled_time.unwrap_or("")),
    ])
}

pub fn build_todo_dedupe_key(todo: &TodoRecord) -> String {
    todo_dedupe_key(
        &todo.date,
        &todo.content,
        todo.completed,
        todo.scheduled_time.as_deref(),
    )
}

/// De-duplication key for a sticky note given its significant fields.
pub fn sticky_note_dedupe_key(date: &str, content: &str) -> String {
    join_key(&[date, &normalize_text_for_key(content)])
}

pub fn build_sticky_note_dedupe_key(note: &StickyNoteRecord) -> String {
    sticky_note_dedupe_key(&note.date, &note.content)
}

/// DJB2-xor hash over UTF-16 code units, as 8 lower-case hex digits.
///
/// Only an idempotency marker; not collision resistant.
pub fn generate_import_content_hash(content: &str) -> String {
    let hash = content.encode_utf16().fold(DJB2_SEED, |hash, unit| {
        (hash << 5).wrapping_add(hash) ^ u32::from(unit)
    });
    format!("{hash:08x}")
}

pub fn build_import_marker(content_hash: &str) -> String {
    format!("<!-- journal-import:{content_hash} -->")
}

pub fn has_import_marker(content: &str, content_hash: &str) -> bool {
    normalize_line_endings(content).contains(&build_import_marker(content_hash))
}

/// Collects every marker hash in `content`, lower-cased.
pub fn extract_import_markers(content: &str) -> HashSet<String> {
    let normalized = normalize_line_endings(content);
    IMPORT_MARKER_RE
        .captures_iter(&normalized)
        .filter_map(|caps| caps.get(1))
        .map(|hash| hash.as_str().to_lowercase())
        .collect()
}

/// Appends imported text below existing content, preceded by a rule and the marker.
pub fn append_imported_content(
    existing_content: &str,
    imported_content: &str,
    content_hash: &str,
) -> String {
    let existing = normalize_line_endings(existing_content);
    format!(
        "{}{IMPORT_SEPARATOR}{}\n{}",
        existing.trim_end(),
        build_import_marker(content_hash),
        normalize_content(imported_content)
    )
}

fn join_key(parts: &[&str]) -> String {
    let mut key = String::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn line_endings_become_lf() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn date_validation_is_strict_and_calendar_aware() {
        assert!(is_valid_date_string("2025-02-28"));
        assert!(is_valid_date_string("2024-02-29"));
        assert!(!is_valid_date_string("2025-02-30"));
        assert!(!is_valid_date_string("2025-02-29"));
        assert!(!is_valid_date_string("2025-2-28"));
        assert!(!is_valid_date_string("2025-13-01"));
        assert!(!is_valid_date_string(" 2025-01-01"));
        assert!(!is_valid_date_string("2025-01-01T00:00"));
        assert!(!is_valid_date_string("0000-01-01"));
        assert!(!is_valid_date_string("0099-12-31"));
        assert!(is_valid_date_string("0100-01-01"));
    }

    #[test]
    fn completed_values_accept_known_flags_only() {
        assert_eq!(parse_completed_text(" YES "), Some(true));
        assert_eq!(parse_completed_text("x"), Some(true));
        assert_eq!(parse_completed_text(""), Some(false));
        assert_eq!(parse_completed_text("No"), Some(false));
        assert_eq!(parse_completed_text("done"), None);

        assert_eq!(parse_completed_value(&json!(true)), Some(true));
        assert_eq!(parse_completed_value(&json!(1)), Some(true));
        assert_eq!(parse_completed_value(&json!(0)), Some(false));
        assert_eq!(parse_completed_value(&json!(2)), None);
        assert_eq!(parse_completed_value(&json!("FALSE")), Some(false));
        assert_eq!(parse_completed_value(&json!(null)), Some(false));
        assert_eq!(parse_completed_value(&json!([])), None);
    }

    #[test]
    fn key_text_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_text_for_key("  Buy\r\n  MILK\tnow "),
            "buy milk now"
        );
    }

    #[test]
    fn todo_keys_ignore_formatting_but_not_completion() {
        let base = todo_dedupe_key("2025-01-01", "Buy milk", false, Some("9:00 AM"));
        assert_eq!(
            base,
            todo_dedupe_key("2025-01-01", " buy   MILK ", false, Some("9:00 am"))
        );
        assert_ne!(
            base,
            todo_dedupe_key("2025-01-01", "Buy milk", true, Some("9:00 AM"))
        );
        assert_eq!(
            todo_dedupe_key("2025-01-01", "a", false, None),
            todo_dedupe_key("2025-01-01", "a", false, Some("  "))
        );
    }

    #[test]
    fn content_hash_is_stable_eight_hex_digits() {
        let hash = generate_import_content_hash("Imported block");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, generate_import_content_hash("Imported block"));
        assert_ne!(hash, generate_import_content_hash("Imported blocK"));
        assert_eq!(generate_import_content_hash(""), "00001505");
    }

    #[test]
    fn appended_content_carries_marker_for_its_hash() {
        let hash = generate_import_content_hash("new text");
        let merged = append_imported_content("Existing day\r\n\r\n", "  new text\r\n", &hash);
        assert_eq!(
            merged,
            format!("Existing day\n\n---\n\n<!-- journal-import:{hash} -->\nnew text")
        );
        assert!(has_import_marker(&merged, &hash));
        assert!(extract_import_markers(&merged).contains(&hash));
    }

    #[test]
    fn marker_extraction_tolerates_spacing_and_case() {
        let content = "a\n<!--journal-import:ABCDEF01-->\nb\n<!--   journal-import:0000beef   -->";
        let markers = extract_import_markers(content);
        assert_eq!(markers.len(), 2);
        assert!(markers.contains("abcdef01"));
        assert!(markers.contains("0000beef"));
    }

    #[test]
    fn scheduled_time_blank_becomes_none() {
        assert_eq!(normalize_scheduled_time(Some("  ")), None);
        assert_eq!(normalize_scheduled_time(None), None);
        assert_eq!(
            normalize_scheduled_time(Some(" 9:00 AM ")).as_deref(),
            Some("9:00 AM")
        );
    }
}
