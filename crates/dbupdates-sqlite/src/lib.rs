//! SQLite-backed stores for the dbupdates processors
//!
//! Each processor owns its store handles; a handle wraps one connection and
//! hands out `BEGIN IMMEDIATE` transactions for the transaction coordinator.
//!
//! Key features:
//! - Schema per store kind (sync API, accounts, devices)
//! - Store locator resolving database names through configuration
//! - Position-guarded upserts so replayed records never regress a row

pub mod locator;
pub mod ops;
pub mod schema;
pub mod store;
pub mod txn;

pub use locator::StoreLocator;
pub use ops::{DeviceRow, ProfileRow, RoomStateRow, SettingRow};
pub use store::SqliteStore;
pub use txn::SqliteTxn;
