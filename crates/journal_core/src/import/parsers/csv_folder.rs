//! CSV folder parser.
//!
//! # Responsibility
//! - Discover `entries.csv`, `todos.csv` and `sticky_notes.csv` in a folder.
//! - Validate headers per file and rows per record.
//!
//! # Invariants
//! - File names are matched case-insensitively; the first spelling wins.
//! - Files are processed in the fixed order entries, todos, sticky notes.
//! - A file with missing headers is skipped without affecting siblings.
//! - Row numbers are spreadsheet lines: first data row is row 2.

use super::Diagnostics;
use crate::import::normalize::{
    is_valid_date_string, normalize_content, normalize_date, normalize_scheduled_time,
    parse_completed_text,
};
use crate::import::types::{
    CanonicalRecords, EntryRecord, ImportFormat, ParsedImport, StickyNoteRecord, TodoRecord,
};
use csv::{ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const UTF8_BOM: char = '\u{feff}';
const HEADER_ROW_OFFSET: usize = 2;

/// The three recognized files, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvFile {
    Entries,
    Todos,
    StickyNotes,
}

impl CsvFile {
    const ALL: [Self; 3] = [Self::Entries, Self::Todos, Self::StickyNotes];

    fn file_name(self) -> &'static str {
        match self {
            Self::Entries => "entries.csv",
            Self::Todos => "todos.csv",
            Self::StickyNotes => "sticky_notes.csv",
        }
    }

    fn required_headers(self) -> &'static [&'static str] {
        match self {
            Self::Entries | Self::StickyNotes => &["date", "content"],
            Self::Todos => &["date", "content", "completed", "scheduled_time"],
        }
    }

    fn from_file_name(lower_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|file| file.file_name() == lower_name)
    }
}

/// Parses every recognized CSV file in `folder`.
pub fn parse_csv_folder(folder: &Path) -> ParsedImport {
    let mut diagnostics = Diagnostics::default();
    let mut records = CanonicalRecords::default();

    let csv_names = match list_csv_names(folder) {
        Ok(names) => names,
        Err(err) => {
            diagnostics.error(format!("Unable to read folder: {err}"));
            return diagnostics.finish(ImportFormat::CsvFolder, records);
        }
    };

    // lower-cased name -> name as found on disk
    let mut by_lower_name = BTreeMap::new();
    for name in &csv_names {
        let lower = name.to_lowercase();
        if by_lower_name.contains_key(&lower) {
            diagnostics.warn(format!("{name}: duplicate CSV filename ignored"));
        } else {
            by_lower_name.insert(lower, name.clone());
        }
    }
    for name in &csv_names {
        if CsvFile::from_file_name(&name.to_lowercase()).is_none() {
            diagnostics.warn(format!("{name}: unsupported CSV file ignored"));
        }
    }

    let found = CsvFile::ALL
        .into_iter()
        .filter_map(|file| {
            by_lower_name
                .get(file.file_name())
                .map(|name| (file, name.clone()))
        })
        .collect::<Vec<_>>();
    if found.is_empty() {
        diagnostics.error(
            "No supported CSV files found. Expected at least one of: entries.csv, todos.csv, sticky_notes.csv",
        );
        return diagnostics.finish(ImportFormat::CsvFolder, records);
    }

    for (file, name) in found {
        match fs::read_to_string(folder.join(&name)) {
            Ok(content) => parse_file(file, &name, &content, &mut records, &mut diagnostics),
            Err(err) => diagnostics.error(format!("{name}: failed to read file ({err})")),
        }
    }

    diagnostics.finish(ImportFormat::CsvFolder, records)
}

/// Directory entries ending in `.csv`, sorted for deterministic warnings.
fn list_csv_names(folder: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(folder)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".csv") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn parse_file(
    file: CsvFile,
    name: &str,
    content: &str,
    records: &mut CanonicalRecords,
    diagnostics: &mut Diagnostics,
) {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => normalize_headers(headers),
        Err(err) => {
            diagnostics.error(format!("{name}: CSV parse error at row 1 ({err})"));
            return;
        }
    };

    let required = file.required_headers();
    let missing = required
        .iter()
        .filter(|header| !headers.iter().any(|found| found.as_str() == **header))
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        diagnostics.error(format!(
            "{name}: missing required header(s): {}",
            missing.join(", ")
        ));
        return;
    }
    for header in &headers {
        if !required.contains(&header.as_str()) {
            diagnostics.warn(format!("{name}: extra column \"{header}\" ignored"));
        }
    }

    let columns = Columns::new(&headers);
    let mut data_index = 0usize;
    for result in reader.records() {
        let row_number = data_index + HEADER_ROW_OFFSET;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                diagnostics.error(format!(
                    "{name}: CSV parse error at row {row_number} ({err})"
                ));
                data_index += 1;
                continue;
            }
        };
        if is_empty_line(&record) {
            continue;
        }
        data_index += 1;

        let row = Row {
            name,
            number: row_number,
            record: &record,
            columns: &columns,
        };
        match file {
            CsvFile::Entries => {
                if let Some((date, content)) = row.date_and_content(diagnostics) {
                    records.entries.push(EntryRecord { date, content });
                }
            }
            CsvFile::Todos => {
                if let Some(todo) = row.todo(diagnostics) {
                    records.todos.push(todo);
                }
            }
            CsvFile::StickyNotes => {
                if let Some((date, content)) = row.date_and_content(diagnostics) {
                    records.sticky_notes.push(StickyNoteRecord { date, content });
                }
            }
        }
    }
}

fn normalize_headers(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let header = if index == 0 {
                header.trim_start_matches(UTF8_BOM)
            } else {
                header
            };
            header.trim().to_lowercase()
        })
        .collect()
}

/// A line with nothing on it. Comma-only rows are data and get validated.
fn is_empty_line(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(str::is_empty)
}

/// Column positions of the known headers. First occurrence wins.
struct Columns {
    date: Option<usize>,
    content: Option<usize>,
    completed: Option<usize>,
    scheduled_time: Option<usize>,
}

impl Columns {
    fn new(headers: &[String]) -> Self {
        let position = |name: &str| headers.iter().position(|header| header == name);
        Self {
            date: position("date"),
            content: position("content"),
            completed: position("completed"),
            scheduled_time: position("scheduled_time"),
        }
    }
}

struct Row<'a> {
    name: &'a str,
    number: usize,
    record: &'a StringRecord,
    columns: &'a Columns,
}

impl Row<'_> {
    /// Missing cells read as empty text.
    fn cell(&self, column: Option<usize>) -> &str {
        column
            .and_then(|index| self.record.get(index))
            .unwrap_or("")
    }

    fn date_and_content(&self, diagnostics: &mut Diagnostics) -> Option<(String, String)> {
        let raw_date = self.cell(self.columns.date);
        let date = normalize_date(raw_date);
        if !is_valid_date_string(&date) {
            diagnostics.error(format!(
                "{}: row {} has invalid date \"{raw_date}\"",
                self.name, self.number
            ));
            return None;
        }

        let content = normalize_content(self.cell(self.columns.content));
        if content.is_empty() {
            diagnostics.error(format!("{}: row {} has empty content", self.name, self.number));
            return None;
        }
        Some((date, content))
    }

    fn todo(&self, diagnostics: &mut Diagnostics) -> Option<TodoRecord> {
        let (date, content) = self.date_and_content(diagnostics)?;

        let raw_completed = self.cell(self.columns.completed);
        let Some(completed) = parse_completed_text(raw_completed) else {
            diagnostics.error(format!(
                "{}: row {} has invalid completed value \"{raw_completed}\"",
                self.name, self.number
            ));
            return None;
        };

        Some(TodoRecord {
            date,
            content,
            completed,
            scheduled_time: normalize_scheduled_time(Some(self.cell(self.columns.scheduled_time))),
        })
    }
}
