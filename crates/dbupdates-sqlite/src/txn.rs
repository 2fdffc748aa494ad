use dbupdates_core::{
    error::{DbUpdatesError, Result},
    traits::Transaction,
};
use parking_lot::ReentrantMutexGuard;
use rusqlite::Connection;

/// Write transaction holding the store's connection for its whole lifetime
///
/// Beginning a transaction while the same thread already has one open on the
/// store yields a *joined* transaction. Both handles then share one SQLite
/// transaction: only the owner's commit issues `COMMIT`, and a rollback
/// through either handle discards the shared work.
///
/// Dropping a transaction that was neither committed nor rolled back rolls it back.
pub struct SqliteTxn<'a> {
    conn: ReentrantMutexGuard<'a, Connection>,
    joined: bool,
    in_txn: bool,
}

impl<'a> SqliteTxn<'a> {
    pub(crate) fn begin(conn: ReentrantMutexGuard<'a, Connection>) -> Result<Self> {
        if !conn.is_autocommit() {
            return Ok(Self {
                conn,
                joined: true,
                in_txn: true,
            });
        }

        conn.execute("BEGIN IMMEDIATE TRANSACTION", [])
            .map_err(|e| DbUpdatesError::Transaction(format!("begin: {}", e)))?;

        Ok(Self {
            conn,
            joined: false,
            in_txn: true,
        })
    }

    /// Connection to run statements inside this transaction
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Whether this handle joined a transaction another handle owns
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    fn rollback_shared(&self) -> rusqlite::Result<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute("ROLLBACK", []).map(|_| ())
    }
}

impl Transaction for SqliteTxn<'_> {
    fn commit(mut self) -> Result<()> {
        if self.in_txn {
            if !self.joined {
                self.conn
                    .execute("COMMIT", [])
                    .map_err(|e| DbUpdatesError::Transaction(format!("commit: {}", e)))?;
            }
            self.in_txn = false;
        }
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        if self.in_txn {
            self.in_txn = false;
            self.rollback_shared()
                .map_err(|e| DbUpdatesError::Transaction(format!("rollback: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for SqliteTxn<'_> {
    fn drop(&mut self) {
        if self.in_txn {
            let _ = self.rollback_shared();
        }
    }
}
