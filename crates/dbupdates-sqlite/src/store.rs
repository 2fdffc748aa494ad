use dbupdates_core::{
    config::{StoreConfig, StoreKind, SynchronousMode},
    error::{DbUpdatesError, Result},
    traits::TxnResource,
};
use parking_lot::ReentrantMutex;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;

use crate::schema;
use crate::txn::SqliteTxn;

/// SQLite store handle owned by a single processor
///
/// The connection lock is reentrant: a thread that already holds a
/// transaction on this store can begin a second one, which joins the first
/// (see [`SqliteTxn`]).
#[derive(Debug)]
pub struct SqliteStore {
    name: String,
    conn: ReentrantMutex<Connection>,
    config: StoreConfig,
}

impl SqliteStore {
    /// Open (creating if needed) the database described by `cfg`
    pub fn open(name: &str, cfg: &StoreConfig) -> Result<Self> {
        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &cfg.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| DbUpdatesError::Store(format!("open {}: {}", cfg.path.display(), e)))?;

        Self::configure_connection(&conn, cfg)?;
        schema::init_schema(&conn, cfg.kind)?;

        tracing::debug!(
            database = name,
            kind = cfg.kind.as_str(),
            path = %cfg.path.display(),
            "Opened store"
        );

        Ok(Self {
            name: name.to_string(),
            conn: ReentrantMutex::new(conn),
            config: cfg.clone(),
        })
    }

    /// Database name this handle was resolved from
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StoreKind {
        self.config.kind
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run `f` against the connection
    ///
    /// Each statement autocommits unless this thread has a transaction open
    /// on the store, in which case the statements join it.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    fn configure_connection(conn: &Connection, cfg: &StoreConfig) -> Result<()> {
        if cfg.wal_mode {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| DbUpdatesError::Config(e.to_string()))?;
        }

        let sync_mode = match cfg.synchronous {
            SynchronousMode::Full => "FULL",
            SynchronousMode::Normal => "NORMAL",
            SynchronousMode::Off => "OFF",
        };
        conn.pragma_update(None, "synchronous", sync_mode)
            .map_err(|e| DbUpdatesError::Config(e.to_string()))?;

        conn.pragma_update(None, "cache_size", cfg.cache_size)
            .map_err(|e| DbUpdatesError::Config(e.to_string()))?;

        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
            .map_err(|e| DbUpdatesError::Config(e.to_string()))?;

        Ok(())
    }
}

impl TxnResource for SqliteStore {
    type Txn<'a> = SqliteTxn<'a>;

    fn begin(&self) -> Result<Self::Txn<'_>> {
        SqliteTxn::begin(self.conn.lock())
    }
}
