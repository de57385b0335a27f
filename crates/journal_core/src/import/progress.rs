//! Progress reporting and cooperative yield points for long imports.

use std::fmt::{Display, Formatter};
use std::thread;

/// Stage of an execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportPhase {
    /// Classifying records against the snapshot.
    Processing,
    /// Flushing staged writes chunk by chunk.
    Writing,
}

impl Display for ImportPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => f.write_str("processing"),
            Self::Writing => f.write_str("writing"),
        }
    }
}

/// One progress tick. `current` never exceeds `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportProgress {
    pub current: usize,
    pub total: usize,
    pub phase: ImportPhase,
}

/// Hook invoked periodically so the host can run other work.
pub trait YieldHook {
    fn yield_now(&mut self);
}

/// Never yields. For tests and batch jobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

impl YieldHook for NoYield {
    fn yield_now(&mut self) {}
}

/// Yields the current OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadYield;

impl YieldHook for ThreadYield {
    fn yield_now(&mut self) {
        thread::yield_now();
    }
}
