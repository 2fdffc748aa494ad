//! Processor contract
//!
//! A processor owns the stores of one event namespace and applies ordered
//! batches of that namespace's records to them. Lifecycle:
//! constructed (registry constructor) → [`Processor::start`] → repeated
//! [`Processor::process`] for the rest of the process lifetime.

use async_trait::async_trait;
use dbupdates_core::{
    error::{DbUpdatesError, Result},
    observe,
    types::EventRecord,
};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Lifecycle state of a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Constructed,
    Started,
}

/// Outcome of one `process` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records in the batch
    pub records: usize,
    /// Records whose mutation went through (including no-op replays)
    pub applied: usize,
    /// Records whose mutation failed; logged and skipped
    pub failed: usize,
    /// Records with a key this namespace does not handle
    pub skipped: usize,
    pub duration: Duration,
}

impl BatchReport {
    fn new(records: usize) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }
}

/// One event namespace's apply logic
#[async_trait]
pub trait Processor: Send + Sync {
    /// Registered name, also used in logs
    fn name(&self) -> &str;

    fn state(&self) -> ProcessorState;

    /// Open the backing stores
    ///
    /// An error here is fatal: the namespace cannot run without its stores.
    fn start(&mut self) -> Result<()>;

    /// Apply an ordered batch of records
    ///
    /// Per-record failures are logged and counted, never returned. An error
    /// means the batch as a whole was not attempted: empty or out-of-order
    /// framing, a processor that was never started, or cancellation.
    async fn process(&self, cancel: &CancellationToken, batch: &[EventRecord]) -> Result<BatchReport>;
}

/// Reject batches that cannot be applied as a unit
pub fn check_batch(batch: &[EventRecord]) -> Result<()> {
    if batch.is_empty() {
        return Err(DbUpdatesError::MalformedBatch("empty batch".into()));
    }

    for pair in batch.windows(2) {
        if pair[1].partition == pair[0].partition && pair[1].position < pair[0].position {
            return Err(DbUpdatesError::MalformedBatch(format!(
                "position {} follows {} in partition {}",
                pair[1].position, pair[0].position, pair[0].partition
            )));
        }
    }
    Ok(())
}

/// Apply every record of `batch` in order with `apply`
///
/// Each record is dispatched on its own key. Failures are logged with the
/// record's key, partition, position and mutation target, then skipped; the
/// remaining records still run. Cancellation is checked before each record.
pub fn apply_each<F>(
    processor: &str,
    cancel: &CancellationToken,
    batch: &[EventRecord],
    mut apply: F,
) -> Result<BatchReport>
where
    F: FnMut(&EventRecord) -> Result<()>,
{
    check_batch(batch)?;

    let start = Instant::now();
    let mut report = BatchReport::new(batch.len());

    for record in batch {
        if cancel.is_cancelled() {
            warn!(
                processor,
                partition = record.partition,
                position = record.position,
                applied = report.applied,
                "Batch cancelled before completion"
            );
            return Err(DbUpdatesError::Cancelled);
        }

        match apply(record) {
            Ok(()) => report.applied += 1,
            Err(DbUpdatesError::UnknownKey(key)) => {
                error!(
                    processor,
                    key = %key,
                    partition = record.partition,
                    position = record.position,
                    "Invalid event key, skipping record"
                );
                report.skipped += 1;
            }
            Err(e) => {
                error!(
                    processor,
                    key = %record.key,
                    partition = record.partition,
                    position = record.position,
                    target = %record.payload.target(),
                    error = %e,
                    "Failed to apply record"
                );
                report.failed += 1;
            }
        }
    }

    report.duration = start.elapsed();
    observe::record_batch(
        processor,
        report.applied as u64,
        report.failed as u64,
        report.skipped as u64,
        report.duration,
    );
    debug!(
        processor,
        records = report.records,
        applied = report.applied,
        failed = report.failed,
        skipped = report.skipped,
        "Applied batch in {:?}",
        report.duration
    );

    Ok(report)
}
