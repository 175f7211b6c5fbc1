//! Time-bounded range scanner
//!
//! Answers "which runs were active during `[start, end)`" over one partition
//! without holding a single transaction open for the whole keyspace. The scan
//! is split into batches; each batch stops once its wall-clock budget is spent
//! and the next batch resumes right after the last key visited.
//!
//! Batches may run in separate transactions and therefore observe different
//! snapshots. A run that moves partitions between two batches can be missed
//! or reported twice; callers union the results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use runstore_concurrency::TransactionContext;
use runstore_core::{stop_key_for_prefix, Partition, Result, RunId, RunKey, RunRecord};
use tracing::trace;

/// Monotonic clock used to bound scan batches
pub trait Ticker: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall-clock ticker
#[derive(Debug, Clone, Copy)]
pub struct SystemTicker {
    origin: Instant,
}

impl SystemTicker {
    /// Ticker with its origin at the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for SystemTicker {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven ticker
///
/// Time only moves through [`ManualTicker::advance`] or, when built with
/// [`ManualTicker::with_step`], by a fixed step on every reading.
#[derive(Debug, Default)]
pub struct ManualTicker {
    nanos: AtomicU64,
    step_nanos: u64,
}

impl ManualTicker {
    /// Ticker frozen at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticker that advances by `step` after every reading
    pub fn with_step(step: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(0),
            step_nanos: duration_nanos(step),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }
}

impl Ticker for ManualTicker {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.step_nanos, Ordering::SeqCst))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Resumable scan for runs active during a time window
///
/// Drive it with [`RunningInRangeScan::next_batch`], one transaction per
/// batch, until it returns `None`.
pub struct RunningInRangeScan<'t> {
    partition: Partition,
    start_secs: i64,
    end_secs: i64,
    budget: Duration,
    ticker: &'t dyn Ticker,
    cursor: Option<Vec<u8>>,
    end_key: Option<Vec<u8>>,
}

impl<'t> RunningInRangeScan<'t> {
    /// Scan over the whole of `partition`
    pub fn new(
        partition: Partition,
        start_secs: i64,
        end_secs: i64,
        budget: Duration,
        ticker: &'t dyn Ticker,
    ) -> Self {
        let prefix = partition.prefix();
        let end_key = stop_key_for_prefix(prefix.as_bytes());
        Self {
            partition,
            start_secs,
            end_secs,
            budget,
            ticker,
            cursor: Some(prefix.into_bytes()),
            end_key,
        }
    }

    /// True once a batch has visited no rows or the keyspace ran out
    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }

    /// Scan one batch inside `txn`
    ///
    /// Returns the matching run ids, or `None` when the batch visited no
    /// rows and the partition is exhausted. At least one row is visited per
    /// batch regardless of the budget, so the scan always makes progress.
    pub fn next_batch(&mut self, txn: &mut TransactionContext) -> Result<Option<Vec<RunId>>> {
        let start = match self.cursor.take() {
            Some(start) => start,
            None => return Ok(None),
        };

        let began = self.ticker.now();
        let mut visited = 0usize;
        let mut last_key: Option<Vec<u8>> = None;
        let mut matches = Vec::new();
        let (window_start, window_end) = (self.start_secs, self.end_secs);
        let (budget, ticker) = (self.budget, self.ticker);

        txn.scan_range(&start, self.end_key.as_deref(), |key, value| {
            if visited > 0 && ticker.now().saturating_sub(began) > budget {
                return Ok(false);
            }
            visited += 1;
            last_key = Some(key.to_vec());

            let run_key = RunKey::decode(key)?;
            let record = RunRecord::from_value(run_key.program, value)?;
            if record.overlaps(window_start, window_end) {
                matches.push(record.run_id);
            }
            Ok(true)
        })?;

        trace!(
            target: "runstore::scan",
            partition = %self.partition,
            visited,
            matched = matches.len(),
            "Range scan batch finished"
        );

        if visited == 0 {
            return Ok(None);
        }
        // A run key is never a strict prefix of another, so the prefix
        // successor of the last key is its immediate successor among rows
        self.cursor = last_key.and_then(|k| stop_key_for_prefix(&k));
        Ok(Some(matches))
    }
}
