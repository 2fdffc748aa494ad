use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which schema a database carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Read-side tables served to sync clients (current room state, profiles)
    SyncApi,
    /// Account data: profiles and per-user settings
    Accounts,
    /// Per-user device records
    Devices,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::SyncApi => "sync_api",
            StoreKind::Accounts => "accounts",
            StoreKind::Devices => "devices",
        }
    }
}

/// Configuration for a single SQLite-backed store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Schema carried by this database
    pub kind: StoreKind,

    /// Path to the SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode
    /// Default: true
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// SQLite synchronous mode
    #[serde(default)]
    pub synchronous: SynchronousMode,

    /// SQLite cache size (in pages, negative = KB)
    /// Default: -16000 (16MB)
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,

    /// How long a writer waits on a locked database before failing
    /// Default: 5000ms
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SynchronousMode {
    /// Full fsync (safest, slowest)
    Full,
    /// fsync at critical moments (good balance)
    #[default]
    Normal,
    /// No fsync (fastest, least safe)
    Off,
}

fn default_wal_mode() -> bool {
    true
}

fn default_cache_size() -> i32 {
    -16000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl StoreConfig {
    pub fn new(kind: StoreKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            wal_mode: default_wal_mode(),
            synchronous: SynchronousMode::default(),
            cache_size: default_cache_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }

    pub fn with_synchronous(mut self, synchronous: SynchronousMode) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Path identifying the database file, for telling whether two configs
    /// point at the same file
    ///
    /// Resolved through the filesystem where possible; a file that does not
    /// exist yet is resolved through its parent directory.
    pub fn file_identity(&self) -> PathBuf {
        if let Ok(path) = self.path.canonicalize() {
            return path;
        }
        match (self.path.parent(), self.path.file_name()) {
            (Some(parent), Some(file)) => parent
                .canonicalize()
                .map(|p| p.join(file))
                .unwrap_or_else(|_| self.path.clone()),
            _ => self.path.clone(),
        }
    }
}
