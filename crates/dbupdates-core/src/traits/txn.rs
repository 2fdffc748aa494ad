use crate::error::Result;

/// A started transaction that can be finished exactly once
pub trait Transaction {
    /// Commit all changes made in this transaction
    fn commit(self) -> Result<()>;

    /// Discard all changes made in this transaction
    fn rollback(self) -> Result<()>;
}

/// A store that hands out transactions
///
/// Note: transactions may borrow the resource, so they are tied to its lifetime
pub trait TxnResource {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    /// Begin a new transaction
    fn begin(&self) -> Result<Self::Txn<'_>>;
}
