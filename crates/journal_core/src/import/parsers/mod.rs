//! Format parsers that turn an external source into canonical records.
//!
//! # Responsibility
//! - Dispatch an [`ImportSource`] to the parser for its format.
//! - Collect structural errors and non-fatal warnings as readable strings.
//!
//! # Invariants
//! - Parsers never return `Err`; I/O failures become a single error string.
//! - When `errors` is non-empty, records may be partial.

pub mod csv_folder;
pub mod json_bundle;

use crate::import::types::{CanonicalRecords, ImportFormat, ImportSource, ParsedImport};
use log::info;
use std::time::Instant;

pub use csv_folder::parse_csv_folder;
pub use json_bundle::{parse_json_bundle, parse_json_bundle_str};

/// Parses `source` according to its format and logs a summary event.
pub fn parse_source(source: &ImportSource) -> ParsedImport {
    let started_at = Instant::now();
    let parsed = match source.format {
        ImportFormat::JsonBundle => parse_json_bundle(&source.path, source.content.as_deref()),
        ImportFormat::CsvFolder => parse_csv_folder(&source.path),
    };

    info!(
        "event=import_parse module=import status={} format={} entries={} todos={} sticky_notes={} errors={} warnings={} duration_ms={}",
        if parsed.errors.is_empty() { "ok" } else { "error" },
        parsed.format,
        parsed.records.entries.len(),
        parsed.records.todos.len(),
        parsed.records.sticky_notes.len(),
        parsed.errors.len(),
        parsed.warnings.len(),
        started_at.elapsed().as_millis()
    );
    parsed
}

/// Error/warning accumulator shared by the parsers.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Diagnostics {
    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub(crate) fn finish(self, format: ImportFormat, records: CanonicalRecords) -> ParsedImport {
        ParsedImport {
            format,
            records,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}
