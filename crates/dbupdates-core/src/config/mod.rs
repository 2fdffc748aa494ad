pub mod dispatch;
pub mod store;

pub use dispatch::DispatchConfig;
pub use store::{StoreConfig, StoreKind, SynchronousMode};

use crate::error::{DbUpdatesError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level configuration snapshot handed to every processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbUpdatesConfig {
    /// Index of this instance in a multi-instance deployment
    #[serde(default)]
    pub instance: u32,

    /// Base topic name; each namespace consumes `{topic_prefix}_{namespace}`
    /// Default: "dbupdates"
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Databases by name, resolved by processors through the store locator
    #[serde(default)]
    pub databases: BTreeMap<String, StoreConfig>,

    /// Namespaces whose processors the dispatch loop runs
    #[serde(default)]
    pub namespaces: Vec<NamespaceConfig>,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// One namespace bound to the dispatch loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Registered processor name
    pub name: String,

    /// Number of stream partitions consumed for this namespace
    /// Default: 1
    #[serde(default = "default_partitions")]
    pub partitions: u32,

    /// Consumer group identifier, passed through to the transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

fn default_topic_prefix() -> String {
    "dbupdates".to_string()
}

fn default_partitions() -> u32 {
    1
}

impl Default for DbUpdatesConfig {
    fn default() -> Self {
        Self {
            instance: 0,
            topic_prefix: default_topic_prefix(),
            databases: BTreeMap::new(),
            namespaces: Vec::new(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl NamespaceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: default_partitions(),
            group: None,
        }
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }
}

impl DbUpdatesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)
            .map_err(|e| DbUpdatesError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_database(mut self, name: impl Into<String>, store: StoreConfig) -> Self {
        self.databases.insert(name.into(), store);
        self
    }

    pub fn with_namespace(mut self, namespace: NamespaceConfig) -> Self {
        self.namespaces.push(namespace);
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Look up a database by name
    pub fn database(&self, name: &str) -> Result<&StoreConfig> {
        self.databases
            .get(name)
            .ok_or_else(|| DbUpdatesError::Config(format!("no database named '{}' configured", name)))
    }

    /// Topic a namespace is consumed from
    pub fn topic_for(&self, namespace: &str) -> String {
        format!("{}_{}", self.topic_prefix, namespace)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dispatch.channel_capacity == 0 {
            return Err(DbUpdatesError::Config(
                "dispatch.channel_capacity must be greater than zero".into(),
            ));
        }
        if self.dispatch.max_batch_records == 0 {
            return Err(DbUpdatesError::Config(
                "dispatch.max_batch_records must be greater than zero".into(),
            ));
        }

        // Two names on one file would make a write transaction wait on itself
        let mut files: HashMap<PathBuf, &str> = HashMap::new();
        for (name, store) in &self.databases {
            if let Some(other) = files.insert(store.file_identity(), name.as_str()) {
                return Err(DbUpdatesError::Config(format!(
                    "databases '{}' and '{}' share the file {}",
                    other,
                    name,
                    store.path.display()
                )));
            }
        }

        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            if ns.partitions == 0 {
                return Err(DbUpdatesError::Config(format!(
                    "namespace '{}' must have at least one partition",
                    ns.name
                )));
            }
            if !seen.insert(ns.name.as_str()) {
                return Err(DbUpdatesError::Config(format!(
                    "namespace '{}' configured more than once",
                    ns.name
                )));
            }
        }
        Ok(())
    }
}
