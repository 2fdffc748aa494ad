//! Processor registry
//!
//! Maps a namespace name to the constructor of its processor. Namespace
//! modules register themselves while the registry is being assembled; the
//! dispatch loop then receives it behind an `Arc`, after which it is
//! read-only and needs no locking.
//!
//! # Example
//!
//! ```no_run
//! use dbupdates::{processors, ProcessorRegistry};
//! use dbupdates_core::{DbUpdatesConfig, Result};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let mut registry = ProcessorRegistry::new();
//! processors::register_builtin(&mut registry)?;
//!
//! let config = Arc::new(DbUpdatesConfig::from_json_file("dbupdates.json".as_ref())?);
//! let mut processor = registry.build("syncapi_current_room_state", config)?;
//! processor.start()?;
//! # Ok(())
//! # }
//! ```

use crate::processor::Processor;
use dbupdates_core::{
    config::DbUpdatesConfig,
    error::{DbUpdatesError, Result},
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Static arguments stored alongside a constructor at registration time
pub type InitArgs = serde_json::Value;

/// Builds a processor from its registered name, the configuration snapshot
/// and the registration's init args
pub type ProcessorConstructor = Box<
    dyn Fn(&str, Arc<DbUpdatesConfig>, Option<&InitArgs>) -> Result<Box<dyn Processor>>
        + Send
        + Sync,
>;

/// A registered constructor and its init args
pub struct RegistryEntry {
    constructor: ProcessorConstructor,
    init_args: Option<InitArgs>,
}

impl RegistryEntry {
    pub fn init_args(&self) -> Option<&InitArgs> {
        self.init_args.as_ref()
    }
}

/// Catalog of processor constructors keyed by namespace name
#[derive(Default)]
pub struct ProcessorRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in namespace processor
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        crate::processors::register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Register a constructor under `name`
    ///
    /// Names are unique; registering a name twice is rejected and leaves the
    /// first registration in place.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        constructor: F,
        init_args: Option<InitArgs>,
    ) -> Result<()>
    where
        F: Fn(&str, Arc<DbUpdatesConfig>, Option<&InitArgs>) -> Result<Box<dyn Processor>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(DbUpdatesError::AlreadyRegistered(name));
        }

        tracing::debug!(processor = %name, "Registered processor");
        self.entries.insert(
            name,
            RegistryEntry {
                constructor: Box::new(constructor),
                init_args,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&RegistryEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| DbUpdatesError::NotFound(format!("processor '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Construct the processor registered under `name`
    ///
    /// The processor is returned unstarted.
    pub fn build(&self, name: &str, config: Arc<DbUpdatesConfig>) -> Result<Box<dyn Processor>> {
        let entry = self.lookup(name)?;
        (entry.constructor)(name, config, entry.init_args.as_ref())
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{BatchReport, ProcessorState};
    use async_trait::async_trait;
    use dbupdates_core::EventRecord;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct NoopProcessor {
        name: String,
    }

    #[async_trait]
    impl Processor for NoopProcessor {
        fn name(&self) -> &str {
            &self.name
        }

        fn state(&self) -> ProcessorState {
            ProcessorState::Constructed
        }

        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        async fn process(
            &self,
            _cancel: &CancellationToken,
            batch: &[EventRecord],
        ) -> Result<BatchReport> {
            Ok(BatchReport {
                records: batch.len(),
                ..Default::default()
            })
        }
    }

    fn noop(
        name: &str,
        _config: Arc<DbUpdatesConfig>,
        args: Option<&InitArgs>,
    ) -> Result<Box<dyn Processor>> {
        // A "label" init arg overrides the reported name
        let name = args
            .and_then(|a| a.get("label"))
            .and_then(|v| v.as_str())
            .unwrap_or(name);
        Ok(Box::new(NoopProcessor {
            name: name.to_string(),
        }))
    }

    #[test]
    fn test_register_and_build() {
        let mut registry = ProcessorRegistry::new();
        registry.register("noop", noop, None).unwrap();

        assert!(registry.contains("noop"));
        assert_eq!(registry.names(), vec!["noop"]);

        let processor = registry
            .build("noop", Arc::new(DbUpdatesConfig::new()))
            .unwrap();
        assert_eq!(processor.name(), "noop");
        assert!(registry.lookup("noop").unwrap().init_args().is_none());
        assert_eq!(processor.state(), ProcessorState::Constructed);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register("noop", noop, Some(json!({"label": "first"})))
            .unwrap();

        let err = registry
            .register("noop", noop, Some(json!({"label": "second"})))
            .unwrap_err();
        assert!(matches!(err, DbUpdatesError::AlreadyRegistered(ref n) if n == "noop"));

        // First registration is untouched
        let entry = registry.lookup("noop").unwrap();
        assert_eq!(entry.init_args(), Some(&json!({"label": "first"})));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let registry = ProcessorRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.lookup("missing"),
            Err(DbUpdatesError::NotFound(_))
        ));
        assert!(matches!(
            registry.build("missing", Arc::new(DbUpdatesConfig::new())),
            Err(DbUpdatesError::NotFound(_))
        ));
    }

    #[test]
    fn test_init_args_reach_constructor() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(
                "labelled",
                |name: &str, config: Arc<DbUpdatesConfig>, args: Option<&InitArgs>| {
                    let processor = noop(name, config, args)?;
                    Ok(processor)
                },
                Some(json!({"label": "from-init"})),
            )
            .unwrap();

        let built = registry
            .build("labelled", Arc::new(DbUpdatesConfig::new()))
            .unwrap();
        assert_eq!(built.name(), "from-init");
    }

    #[test]
    fn test_builtin_registry() {
        let registry = ProcessorRegistry::builtin().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "account_profiles",
                "account_settings",
                "device_devices",
                "syncapi_current_room_state",
            ]
        );
    }
}
