//! Tunables for import execution.

use crate::db::BusyRetryPolicy;

const DEFAULT_WRITE_CHUNK_SIZE: usize = 50;
const DEFAULT_YIELD_EVERY: usize = 250;

/// Import execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    /// Staged writes per transaction. Values below 1 are treated as 1.
    pub write_chunk_size: usize,
    /// Processed records between cooperative yields. `0` disables yielding.
    pub yield_every: usize,
    /// Busy/locked retry policy for each write transaction.
    pub busy_retry: BusyRetryPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
            yield_every: DEFAULT_YIELD_EVERY,
            busy_retry: BusyRetryPolicy::default(),
        }
    }
}
