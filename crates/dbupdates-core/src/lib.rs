//! dbupdates core: types and traits shared by the update-apply pipeline
//!
//! The pipeline consumes ordered batches of change events (room state,
//! profiles, devices, settings) and materializes them into per-domain
//! relational stores. This crate holds the pieces every layer agrees on:
//! - Event records and the closed set of payload variants
//! - Configuration for stores, namespaces and the dispatch loop
//! - Transaction traits implemented by store backends
//! - The error type and optional metrics hooks

pub mod config;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;

pub use config::{
    DbUpdatesConfig, DispatchConfig, NamespaceConfig, StoreConfig, StoreKind, SynchronousMode,
};
pub use error::{DbUpdatesError, Result};
pub use traits::{Transaction, TxnResource};
pub use types::{
    keys, DeviceDelete, DeviceUpsert, EventPayload, EventRecord, Position, ProfileUpdate,
    RoomStateUpdate, SettingUpdate, Target,
};
