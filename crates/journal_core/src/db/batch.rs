//! Transactional batch executor with busy-contention retry.
//!
//! # Responsibility
//! - Apply an ordered list of parameterized statements in one transaction.
//! - Retry transaction start, each statement and commit on `SQLITE_BUSY`.
//!
//! # Invariants
//! - A batch is either fully committed or fully rolled back.
//! - Statements are always bound with parameters, never interpolated.
//! - Retries are bounded by `BusyRetryPolicy::max_retries`.

use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_MAX_RETRIES: u32 = 10;
const DEFAULT_BUSY_BASE_DELAY: Duration = Duration::from_millis(40);

pub type BatchResult<T> = Result<T, BatchError>;

/// Bounded linear backoff used while the database reports busy/locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyRetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; retry `n` waits `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for BusyRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_BUSY_MAX_RETRIES,
            base_delay: DEFAULT_BUSY_BASE_DELAY,
        }
    }
}

impl BusyRetryPolicy {
    /// Delay applied after failed attempt number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }
}

/// One parameterized write statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: &'static str,
    pub params: Vec<Value>,
    /// Fail the batch when the statement changes no rows.
    pub require_change: bool,
}

impl SqlStatement {
    pub fn new(sql: &'static str, params: Vec<Value>) -> Self {
        Self {
            sql,
            params,
            require_change: false,
        }
    }

    /// Marks the statement as one that must affect at least one row.
    pub fn requiring_change(mut self) -> Self {
        self.require_change = true;
        self
    }
}

/// Point in the batch lifecycle where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Begin,
    Statement(usize),
    Commit,
}

impl Display for BatchStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Statement(index) => write!(f, "statement #{}", index + 1),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Batch failure. The transaction has been rolled back when this is returned.
#[derive(Debug)]
pub enum BatchError {
    /// The database stayed busy/locked past the retry limit.
    Busy {
        stage: BatchStage,
        attempts: u32,
        source: rusqlite::Error,
    },
    /// Non-retryable SQLite failure.
    Sqlite {
        stage: BatchStage,
        source: rusqlite::Error,
    },
    /// A statement marked `require_change` matched no rows.
    Unchanged { stage: BatchStage },
}

impl BatchError {
    pub fn stage(&self) -> BatchStage {
        match self {
            Self::Busy { stage, .. } | Self::Sqlite { stage, .. } | Self::Unchanged { stage } => {
                *stage
            }
        }
    }
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy {
                stage,
                attempts,
                source,
            } => write!(
                f,
                "database stayed busy at {stage} after {attempts} attempt(s): {source}"
            ),
            Self::Sqlite { stage, source } => write!(f, "write batch failed at {stage}: {source}"),
            Self::Unchanged { stage } => write!(f, "write batch failed at {stage}: no rows changed"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Busy { source, .. } | Self::Sqlite { source, .. } => Some(source),
            Self::Unchanged { .. } => None,
        }
    }
}

/// Returns whether `err` is transient lock contention (`SQLITE_BUSY`/`SQLITE_LOCKED`).
pub fn is_busy_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

/// Executes `statements` in order inside one `BEGIN IMMEDIATE` transaction.
///
/// An empty list is a no-op and does not touch the connection.
///
/// # Errors
/// - `BatchError::Busy` when any stage stays busy after all retries.
/// - `BatchError::Unchanged` when a `require_change` statement matched nothing.
/// - `BatchError::Sqlite` for any other failure.
///
/// Nothing from the batch is visible after an error.
pub fn execute_batch(
    conn: &Connection,
    policy: &BusyRetryPolicy,
    statements: &[SqlStatement],
) -> BatchResult<()> {
    if statements.is_empty() {
        return Ok(());
    }

    let started_at = Instant::now();
    let tx = ImmediateTx::begin(conn, policy)?;
    for (index, statement) in statements.iter().enumerate() {
        let stage = BatchStage::Statement(index);
        let changed = retry_on_busy(policy, stage, || {
            conn.execute(statement.sql, params_from_iter(statement.params.iter()))
        })?;
        if statement.require_change && changed == 0 {
            return Err(BatchError::Unchanged { stage });
        }
    }
    tx.commit(policy)?;

    debug!(
        "event=db_batch module=db status=ok statements={} duration_ms={}",
        statements.len(),
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Open `BEGIN IMMEDIATE` transaction that rolls back unless committed.
struct ImmediateTx<'conn> {
    conn: &'conn Connection,
    committed: bool,
}

impl<'conn> ImmediateTx<'conn> {
    fn begin(conn: &'conn Connection, policy: &BusyRetryPolicy) -> BatchResult<Self> {
        retry_on_busy(policy, BatchStage::Begin, || {
            conn.execute_batch("BEGIN IMMEDIATE;")
        })?;
        Ok(Self {
            conn,
            committed: false,
        })
    }

    fn commit(mut self, policy: &BusyRetryPolicy) -> BatchResult<()> {
        retry_on_busy(policy, BatchStage::Commit, || {
            self.conn.execute_batch("COMMIT;")
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for ImmediateTx<'_> {
    fn drop(&mut self) {
        if self.committed || self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            error!("event=db_batch module=db status=error error_code=rollback_failed error={err}");
        }
    }
}

fn retry_on_busy<T>(
    policy: &BusyRetryPolicy,
    stage: BatchStage,
    mut operation: impl FnMut() -> rusqlite::Result<T>,
) -> BatchResult<T> {
    let mut attempt: u32 = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if is_busy_error(&err) => {
                if attempt >= policy.max_retries {
                    return Err(BatchError::Busy {
                        stage,
                        attempts: attempt + 1,
                        source: err,
                    });
                }
                let delay = policy.backoff(attempt);
                warn!(
                    "event=db_busy_retry module=db status=retry stage={stage} attempt={} delay_ms={}",
                    attempt + 1,
                    delay.as_millis()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(BatchError::Sqlite { stage, source: err }),
        }
    }
}
