//! Commonly used types and traits
//!
//! ```
//! use dbupdates::prelude::*;
//! ```

pub use crate::{DbUpdatesConfig, DbUpdatesError, EventPayload, EventRecord, Position, Result};

// Processing
pub use crate::{BatchReport, Processor, ProcessorRegistry, ProcessorState};

// Dispatch
pub use crate::{Batch, BatchSource, ChannelSource, Dispatcher, SourceBinding, WorkerStats};

// Transactions
pub use crate::{with_transaction, Transaction, TxnResource};
