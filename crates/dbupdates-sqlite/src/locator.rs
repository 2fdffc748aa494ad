use dbupdates_core::{
    config::{DbUpdatesConfig, StoreKind},
    error::{DbUpdatesError, Result},
};
use std::sync::Arc;

use crate::store::SqliteStore;

/// Resolves database names to freshly opened store handles
///
/// Every call opens a new connection, so handles are never shared between
/// processors.
#[derive(Clone)]
pub struct StoreLocator {
    config: Arc<DbUpdatesConfig>,
}

impl StoreLocator {
    pub fn new(config: Arc<DbUpdatesConfig>) -> Self {
        Self { config }
    }

    /// Open the database configured under `database`
    pub fn open(&self, database: &str) -> Result<SqliteStore> {
        let cfg = self.config.database(database)?;
        SqliteStore::open(database, cfg)
    }

    /// Open `database`, failing if it is not configured with the expected schema
    pub fn open_kind(&self, database: &str, expected: StoreKind) -> Result<SqliteStore> {
        let cfg = self.config.database(database)?;
        if cfg.kind != expected {
            return Err(DbUpdatesError::Config(format!(
                "database '{}' is a {} store, expected {}",
                database,
                cfg.kind.as_str(),
                expected.as_str()
            )));
        }
        SqliteStore::open(database, cfg)
    }
}
