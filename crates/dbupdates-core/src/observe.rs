//! Optional metrics instrumentation.
//!
//! With the `observe` feature enabled these hooks emit counters and
//! histograms via the [`metrics`] crate; the embedding process installs a
//! recorder. Without the feature every function is a no-op.

use std::time::Duration;

/// Record the outcome of one processed batch.
///
/// - `dbupdates.batch.records_total` – counter with `processor` and `outcome`
///   (`applied` / `failed` / `skipped`) labels
/// - `dbupdates.batch.duration_seconds` – histogram with `processor` label
#[inline]
pub fn record_batch(processor: &str, applied: u64, failed: u64, skipped: u64, duration: Duration) {
    #[cfg(feature = "observe")]
    {
        let processor = processor.to_string();
        for (outcome, count) in [("applied", applied), ("failed", failed), ("skipped", skipped)] {
            if count > 0 {
                metrics::counter!(
                    "dbupdates.batch.records_total",
                    "processor" => processor.clone(),
                    "outcome" => outcome
                )
                .increment(count);
            }
        }
        metrics::histogram!("dbupdates.batch.duration_seconds", "processor" => processor)
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (processor, applied, failed, skipped, duration);
    }
}

/// Record how a two-resource transaction session was finalized.
///
/// - `dbupdates.txn.finalize_total` – counter with `outcome` label
///   (`committed` / `rolled_back` / `commit_failed` / `rollback_failed`)
#[inline]
pub fn record_txn_finalize(committed: bool, had_errors: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = match (committed, had_errors) {
            (true, false) => "committed",
            (true, true) => "commit_failed",
            (false, false) => "rolled_back",
            (false, true) => "rollback_failed",
        };
        metrics::counter!("dbupdates.txn.finalize_total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (committed, had_errors);
    }
}

/// Record a processor start attempt.
///
/// - `dbupdates.processor.start_total` – counter with `processor` and `outcome` labels
#[inline]
pub fn record_processor_start(processor: &str, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!(
            "dbupdates.processor.start_total",
            "processor" => processor.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (processor, success);
    }
}
