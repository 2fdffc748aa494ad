//! Shared fixtures for processor and dispatch tests

#![allow(dead_code)]

use dbupdates::prelude::*;
use dbupdates::{keys, NamespaceConfig, SqliteStore, StoreConfig, StoreKind, StoreLocator};
use dbupdates_core::{DeviceDelete, DeviceUpsert, ProfileUpdate, RoomStateUpdate, SettingUpdate};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub config: Arc<DbUpdatesConfig>,
    pub registry: Arc<ProcessorRegistry>,
    _dir: TempDir,
}

impl Fixture {
    /// Three on-disk stores and the built-in processors
    pub fn new() -> Self {
        Self::with_namespaces(&[])
    }

    pub fn with_namespaces(namespaces: &[(&str, u32)]) -> Self {
        Self::with_config(|dir| {
            let mut config = default_config(dir);
            for (name, partitions) in namespaces {
                config =
                    config.with_namespace(NamespaceConfig::new(*name).with_partitions(*partitions));
            }
            config
        })
    }

    /// Stores laid out by `build` inside a fresh temp dir
    pub fn with_config(build: impl FnOnce(&Path) -> DbUpdatesConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = build(dir.path());

        Self {
            config: Arc::new(config),
            registry: Arc::new(ProcessorRegistry::builtin().unwrap()),
            _dir: dir,
        }
    }

    pub fn started(&self, name: &str) -> Box<dyn Processor> {
        let mut processor = self.registry.build(name, self.config.clone()).unwrap();
        processor.start().unwrap();
        processor
    }

    /// A separate connection for inspecting what processors wrote
    pub fn store(&self, database: &str) -> SqliteStore {
        StoreLocator::new(self.config.clone()).open(database).unwrap()
    }
}

/// The sync API, accounts and devices databases under `dir`
pub fn default_config(dir: &Path) -> DbUpdatesConfig {
    DbUpdatesConfig::new()
        .with_database(
            "syncapi",
            StoreConfig::new(StoreKind::SyncApi, dir.join("syncapi.db")),
        )
        .with_database(
            "accounts",
            StoreConfig::new(StoreKind::Accounts, dir.join("accounts.db")),
        )
        .with_database(
            "devices",
            StoreConfig::new(StoreKind::Devices, dir.join("devices.db")),
        )
}

pub fn room_state(room_id: &str, event_id: &str, name: &str, position: Position) -> EventRecord {
    EventRecord::new(
        keys::ROOM_STATE_UPDATE,
        position,
        EventPayload::RoomStateUpdate(RoomStateUpdate {
            room_id: room_id.into(),
            event_id: event_id.into(),
            event_json: format!(r#"{{"type":"m.room.name","content":{{"name":"{}"}}}}"#, name),
            event_type: "m.room.name".into(),
            state_key: String::new(),
            membership: None,
        }),
    )
}

pub fn membership(room_id: &str, event_id: &str, user_id: &str, position: Position) -> EventRecord {
    EventRecord::new(
        keys::ROOM_STATE_UPDATE,
        position,
        EventPayload::RoomStateUpdate(RoomStateUpdate {
            room_id: room_id.into(),
            event_id: event_id.into(),
            event_json: r#"{"type":"m.room.member","content":{"membership":"join"}}"#.into(),
            event_type: "m.room.member".into(),
            state_key: user_id.into(),
            membership: Some("join".into()),
        }),
    )
}

pub fn profile(user_id: &str, display_name: &str, position: Position) -> EventRecord {
    EventRecord::new(
        keys::PROFILE_UPDATE,
        position,
        EventPayload::ProfileUpdate(ProfileUpdate {
            user_id: user_id.into(),
            display_name: Some(display_name.into()),
            avatar_url: None,
        }),
    )
}

pub fn device_upsert(user_id: &str, device_id: &str, position: Position) -> EventRecord {
    EventRecord::new(
        keys::DEVICE_UPSERT,
        position,
        EventPayload::DeviceUpsert(DeviceUpsert {
            user_id: user_id.into(),
            device_id: device_id.into(),
            display_name: Some(format!("{} phone", user_id)),
            last_seen_ts: Some(1_700_000_000_000 + position),
        }),
    )
}

pub fn device_delete(user_id: &str, device_id: &str, position: Position) -> EventRecord {
    EventRecord::new(
        keys::DEVICE_DELETE,
        position,
        EventPayload::DeviceDelete(DeviceDelete {
            user_id: user_id.into(),
            device_id: device_id.into(),
        }),
    )
}

pub fn setting(user_id: &str, setting_key: &str, value: serde_json::Value, position: Position) -> EventRecord {
    EventRecord::new(
        keys::SETTING_UPDATE,
        position,
        EventPayload::SettingUpdate(SettingUpdate {
            user_id: user_id.into(),
            setting_key: setting_key.into(),
            value,
        }),
    )
}
