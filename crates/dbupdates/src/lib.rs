//! dbupdates: applies ordered change events to per-domain SQLite stores
//!
//! - **Processors**: one per event namespace, each owning the stores it writes
//! - **Registry**: name → constructor map assembled before startup
//! - **Coordinator**: atomic commit or rollback across two stores
//! - **Dispatch**: one worker per partition, batches acknowledged after apply
//!
//! # Quick Start
//!
//! ```no_run
//! use dbupdates::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<()> {
//! let config = Arc::new(DbUpdatesConfig::from_json_file("dbupdates.json".as_ref())?);
//! let registry = Arc::new(ProcessorRegistry::builtin()?);
//! let dispatcher = Dispatcher::start(config, registry)?;
//!
//! let (tx, source) = ChannelSource::channel(16);
//! let binding = SourceBinding::new("syncapi_current_room_state", 0, source);
//! drop(tx);
//!
//! for stats in dispatcher.run(vec![binding]).await? {
//!     println!("{}/{}: {} applied", stats.namespace, stats.partition, stats.applied);
//! }
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod dispatch;
pub mod prelude;
pub mod processor;
pub mod processors;
pub mod registry;

pub use dbupdates_core::{
    config::{DbUpdatesConfig, DispatchConfig, NamespaceConfig, StoreConfig, StoreKind},
    error::{DbUpdatesError, Result},
    keys,
    traits::{Transaction, TxnResource},
    types::{EventPayload, EventRecord, Position},
};
pub use dbupdates_sqlite::{SqliteStore, StoreLocator};

pub use coordinator::{with_transaction, with_transaction_outcome, Finalization, TxnSession};
pub use dispatch::{
    Batch, BatchSource, ChannelSource, CommittedPositions, Dispatcher, SourceBinding, WorkerStats,
};
pub use processor::{apply_each, check_batch, BatchReport, Processor, ProcessorState};
pub use registry::{InitArgs, ProcessorConstructor, ProcessorRegistry, RegistryEntry};
