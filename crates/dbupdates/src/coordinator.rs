//! Two-resource transaction coordinator
//!
//! [`with_transaction`] begins a transaction on each of two resources, runs a
//! unit of work against both, and then commits both or rolls back both. The
//! finalize step lives in [`TxnSession`]'s `Drop`, so it also runs when the
//! unit of work panics.
//!
//! This is not a distributed commit protocol. The two commits are issued one
//! after the other; a crash between them leaves the first resource committed
//! and the second not. Callers that need cross-store durability rely on
//! idempotent, position-keyed mutations and redelivery to converge.
//!
//! # Example
//!
//! ```no_run
//! use dbupdates::coordinator::with_transaction;
//! use dbupdates_core::{ProfileUpdate, Result};
//! use dbupdates_sqlite::{ops, SqliteStore};
//!
//! fn write_profile(accounts: &SqliteStore, sync: &SqliteStore, update: &ProfileUpdate) -> Result<()> {
//!     with_transaction(accounts, sync, |accounts_txn, sync_txn| {
//!         ops::upsert_profile(accounts_txn.conn(), update, 7)?;
//!         ops::upsert_sync_profile(sync_txn.conn(), update, 7)?;
//!         Ok(())
//!     })
//! }
//! ```

use dbupdates_core::{
    error::{DbUpdatesError, Result},
    observe,
    traits::{Transaction, TxnResource},
};
use tracing::{error, warn};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// Both commits were attempted
    Committed { failures: usize },
    /// Both rollbacks were attempted
    RolledBack { failures: usize },
}

impl Finalization {
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            Finalization::Committed { failures: 0 } | Finalization::RolledBack { failures: 0 }
        )
    }
}

/// A pair of started transactions that are finalized exactly once
///
/// Unless [`TxnSession::mark_succeeded`] is called, finalizing rolls both
/// back. Finalization happens on [`TxnSession::finish`] or, failing that, on
/// drop.
pub struct TxnSession<TA: Transaction, TB: Transaction> {
    txns: Option<(TA, TB)>,
    succeeded: bool,
}

impl<TA: Transaction, TB: Transaction> TxnSession<TA, TB> {
    pub fn new(first: TA, second: TB) -> Self {
        Self {
            txns: Some((first, second)),
            succeeded: false,
        }
    }

    /// Both transactions, while the session is still open
    pub fn txns_mut(&mut self) -> Option<(&mut TA, &mut TB)> {
        self.txns.as_mut().map(|(a, b)| (a, b))
    }

    pub fn mark_succeeded(&mut self) {
        self.succeeded = true;
    }

    /// Finalize now and report the outcome
    ///
    /// Returns `None` if the session was already finalized.
    pub fn finish(mut self) -> Option<Finalization> {
        self.finalize()
    }

    fn finalize(&mut self) -> Option<Finalization> {
        let (first, second) = self.txns.take()?;

        let outcome = if self.succeeded {
            let mut failures = 0;
            if let Err(e) = first.commit() {
                error!(error = %e, "Failed to commit first transaction");
                failures += 1;
            }
            if let Err(e) = second.commit() {
                error!(error = %e, "Failed to commit second transaction");
                failures += 1;
            }
            Finalization::Committed { failures }
        } else {
            let mut failures = 0;
            if let Err(e) = first.rollback() {
                warn!(error = %e, "Failed to roll back first transaction");
                failures += 1;
            }
            if let Err(e) = second.rollback() {
                warn!(error = %e, "Failed to roll back second transaction");
                failures += 1;
            }
            Finalization::RolledBack { failures }
        };

        observe::record_txn_finalize(
            matches!(outcome, Finalization::Committed { .. }),
            !outcome.is_clean(),
        );
        Some(outcome)
    }
}

impl<TA: Transaction, TB: Transaction> Drop for TxnSession<TA, TB> {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// Run `f` against one transaction on each resource, all-or-nothing
///
/// - If beginning the first transaction fails, its error is returned and
///   nothing is held.
/// - If beginning the second fails, the first is rolled back and the error
///   is returned.
/// - If `f` returns `Ok`, both transactions are committed; otherwise (error
///   or panic) both are rolled back.
///
/// `f`'s result is returned unchanged. Commit and rollback failures are
/// logged, not returned: by then the outcome of the unit of work is decided.
/// Use [`with_transaction_outcome`] to see them.
///
/// Both resources may be the same store. For SQLite the second `begin` then
/// joins the first transaction, so the pair commits or rolls back as one.
pub fn with_transaction<'r, A, B, T, F>(first: &'r A, second: &'r B, f: F) -> Result<T>
where
    A: TxnResource + 'r,
    B: TxnResource + 'r,
    F: FnOnce(&mut A::Txn<'r>, &mut B::Txn<'r>) -> Result<T>,
{
    with_transaction_outcome(first, second, f).0
}

/// [`with_transaction`], also reporting how the session was finalized
///
/// The finalization is `None` when a begin failed and no session was opened.
pub fn with_transaction_outcome<'r, A, B, T, F>(
    first: &'r A,
    second: &'r B,
    f: F,
) -> (Result<T>, Option<Finalization>)
where
    A: TxnResource + 'r,
    B: TxnResource + 'r,
    F: FnOnce(&mut A::Txn<'r>, &mut B::Txn<'r>) -> Result<T>,
{
    let txn_a = match first.begin() {
        Ok(txn) => txn,
        Err(e) => return (Err(e), None),
    };
    let txn_b = match second.begin() {
        Ok(txn) => txn,
        Err(e) => {
            if let Err(rollback_err) = txn_a.rollback() {
                warn!(error = %rollback_err, "Failed to roll back first transaction after second begin failed");
            }
            return (Err(e), None);
        }
    };

    let mut session = TxnSession::new(txn_a, txn_b);
    let result = match session.txns_mut() {
        Some((a, b)) => f(a, b),
        None => Err(DbUpdatesError::InvalidState(
            "transaction session finalized before use".into(),
        )),
    };

    if result.is_ok() {
        session.mark_succeeded();
    }
    let finalization = session.finish();

    (result, finalization)
}
