//! Bulk import pipeline: parse, preview, execute.
//!
//! # Responsibility
//! - Turn JSON bundles and CSV folders into canonical records.
//! - Reconcile records against existing journal rows without duplicates.
//! - Write the result in chunked transactions with busy retry.
//!
//! # Invariants
//! - Preview and execution classify records with the same rules.
//! - Appended entry content carries one marker per imported content hash.

pub mod execute;
pub mod normalize;
pub mod parsers;
pub mod preview;
pub mod progress;
pub mod reconcile;
pub mod types;

pub use execute::{ExecutionEngine, ImportError, INVALID_PREVIEW_MESSAGE};
pub use parsers::parse_source;
pub use preview::PreviewBuilder;
pub use progress::{ImportPhase, ImportProgress, NoYield, ThreadYield, YieldHook};
pub use reconcile::{EntryDecision, ReconciliationState, TodoDecision};
pub use types::{
    CanonicalRecords, EntryRecord, ExecutionResult, ImportFormat, ImportPlan, ImportPreview,
    ImportSource, ParsedImport, PreviewTotals, StickyNoteRecord, TodoRecord,
};
