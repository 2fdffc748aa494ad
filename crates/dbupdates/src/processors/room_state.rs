//! Current room state for the sync API
//!
//! Each `room-state-update` record replaces the state entry for its
//! `(room_id, event_type, state_key)` tuple, unless the stored entry already
//! carries a later position.

use crate::processor::{apply_each, BatchReport, Processor, ProcessorState};
use crate::registry::{InitArgs, ProcessorRegistry};
use async_trait::async_trait;
use dbupdates_core::{
    config::{DbUpdatesConfig, StoreKind},
    error::{DbUpdatesError, Result},
    keys, observe,
    types::{EventPayload, EventRecord},
};
use dbupdates_sqlite::{ops, SqliteStore, StoreLocator};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{open_store, payload_mismatch, string_arg};

pub const NAME: &str = "syncapi_current_room_state";

const DEFAULT_DATABASE: &str = "syncapi";

pub fn register(registry: &mut ProcessorRegistry) -> Result<()> {
    registry.register(
        NAME,
        RoomStateProcessor::construct,
        Some(json!({ "database": DEFAULT_DATABASE })),
    )
}

pub struct RoomStateProcessor {
    name: String,
    config: Arc<DbUpdatesConfig>,
    database: String,
    store: Option<SqliteStore>,
}

impl RoomStateProcessor {
    pub fn new(name: impl Into<String>, config: Arc<DbUpdatesConfig>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config,
            database: database.into(),
            store: None,
        }
    }

    pub fn construct(
        name: &str,
        config: Arc<DbUpdatesConfig>,
        args: Option<&InitArgs>,
    ) -> Result<Box<dyn Processor>> {
        let database = string_arg(args, "database", DEFAULT_DATABASE)?;
        Ok(Box::new(Self::new(name, config, database)))
    }

    fn store(&self) -> Result<&SqliteStore> {
        self.store
            .as_ref()
            .ok_or_else(|| DbUpdatesError::NotStarted(self.name.clone()))
    }

    fn apply(&self, store: &SqliteStore, record: &EventRecord) -> Result<()> {
        match record.key.as_str() {
            keys::ROOM_STATE_UPDATE => self.apply_upsert(store, record),
            other => Err(DbUpdatesError::UnknownKey(other.to_string())),
        }
    }

    fn apply_upsert(&self, store: &SqliteStore, record: &EventRecord) -> Result<()> {
        let EventPayload::RoomStateUpdate(update) = &record.payload else {
            return Err(payload_mismatch(record));
        };

        let written =
            store.with_conn(|conn| ops::upsert_room_state(conn, update, record.position))?;
        if !written {
            debug!(
                processor = %self.name,
                room_id = %update.room_id,
                event_id = %update.event_id,
                position = record.position,
                "Room state already at a later position"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Processor for RoomStateProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ProcessorState {
        if self.store.is_some() {
            ProcessorState::Started
        } else {
            ProcessorState::Constructed
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.store.is_some() {
            return Err(DbUpdatesError::InvalidState(format!(
                "processor '{}' already started",
                self.name
            )));
        }

        let locator = StoreLocator::new(self.config.clone());
        let store = open_store(&self.name, &locator, &self.database, StoreKind::SyncApi)?;
        self.store = Some(store);
        observe::record_processor_start(&self.name, true);
        Ok(())
    }

    async fn process(&self, cancel: &CancellationToken, batch: &[EventRecord]) -> Result<BatchReport> {
        let store = self.store()?;
        apply_each(&self.name, cancel, batch, |record| self.apply(store, record))
    }
}
