pub mod txn;

pub use txn::{Transaction, TxnResource};
