//! Built-in namespace processors
//!
//! | namespace                    | keys                             | stores            |
//! |------------------------------|----------------------------------|-------------------|
//! | `syncapi_current_room_state` | `room-state-update`              | syncapi           |
//! | `account_profiles`           | `profile-update`                 | accounts, syncapi |
//! | `device_devices`             | `device-upsert`, `device-delete` | devices           |
//! | `account_settings`           | `setting-update`                 | accounts          |

pub mod devices;
pub mod profiles;
pub mod room_state;
pub mod settings;

pub use devices::DeviceProcessor;
pub use profiles::ProfileProcessor;
pub use room_state::RoomStateProcessor;
pub use settings::SettingsProcessor;

use crate::registry::{InitArgs, ProcessorRegistry};
use dbupdates_core::{
    config::StoreKind,
    error::{DbUpdatesError, Result},
    observe,
    types::EventRecord,
};
use dbupdates_sqlite::{SqliteStore, StoreLocator};

/// Register every built-in processor
pub fn register_builtin(registry: &mut ProcessorRegistry) -> Result<()> {
    room_state::register(registry)?;
    profiles::register(registry)?;
    devices::register(registry)?;
    settings::register(registry)?;
    Ok(())
}

/// Read a string init arg, falling back to `default` when absent
pub(crate) fn string_arg(args: Option<&InitArgs>, field: &str, default: &str) -> Result<String> {
    match args.and_then(|a| a.get(field)) {
        None => Ok(default.to_string()),
        Some(value) => value.as_str().map(String::from).ok_or_else(|| {
            DbUpdatesError::Config(format!("init arg '{}' must be a string, got {}", field, value))
        }),
    }
}

pub(crate) fn payload_mismatch(record: &EventRecord) -> DbUpdatesError {
    DbUpdatesError::PayloadMismatch {
        key: record.key.clone(),
        payload: record.payload.kind(),
    }
}

/// Open one of a processor's stores, logging the outcome
pub(crate) fn open_store(
    processor: &str,
    locator: &StoreLocator,
    database: &str,
    kind: StoreKind,
) -> Result<SqliteStore> {
    match locator.open_kind(database, kind) {
        Ok(store) => {
            tracing::info!(processor, database, "Processor store opened");
            Ok(store)
        }
        Err(e) => {
            tracing::error!(processor, database, error = %e, "Failed to open processor store");
            observe::record_processor_start(processor, false);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_arg() {
        let args = json!({"database": "syncapi_b", "bad": 3});
        assert_eq!(
            string_arg(Some(&args), "database", "syncapi").unwrap(),
            "syncapi_b"
        );
        assert_eq!(
            string_arg(Some(&args), "sync_database", "syncapi").unwrap(),
            "syncapi"
        );
        assert_eq!(string_arg(None, "database", "accounts").unwrap(), "accounts");
        assert!(matches!(
            string_arg(Some(&args), "bad", "x"),
            Err(DbUpdatesError::Config(_))
        ));
    }
}
