//! Account profiles
//!
//! A profile change lands in two stores: the accounts store owns the
//! profile, the sync API store keeps the copy served to clients. Both
//! writes for one record run under [`with_transaction_outcome`], so either
//! both stores see the change or neither does. The exception is a commit
//! that fails on one store after the other committed; the record then counts
//! as failed and its redelivery brings the lagging store up to date.

use crate::coordinator::{with_transaction_outcome, Finalization};
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

pub const NAME: &str = "account_profiles";

const DEFAULT_DATABASE: &str = "accounts";
const DEFAULT_SYNC_DATABASE: &str = "syncapi";

pub fn register(registry: &mut ProcessorRegistry) -> Result<()> {
    registry.register(
        NAME,
        ProfileProcessor::construct,
        Some(json!({
            "database": DEFAULT_DATABASE,
            "sync_database": DEFAULT_SYNC_DATABASE,
        })),
    )
}

struct ProfileStores {
    accounts: SqliteStore,
    sync: SqliteStore,
}

pub struct ProfileProcessor {
    name: String,
    config: Arc<DbUpdatesConfig>,
    database: String,
    sync_database: String,
    stores: Option<ProfileStores>,
}

impl ProfileProcessor {
    pub fn new(
        name: impl Into<String>,
        config: Arc<DbUpdatesConfig>,
        database: impl Into<String>,
        sync_database: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            database: database.into(),
            sync_database: sync_database.into(),
            stores: None,
        }
    }

    /// Registry constructor; reads the database names from the init args
    pub fn construct(
        name: &str,
        config: Arc<DbUpdatesConfig>,
        args: Option<&InitArgs>,
    ) -> Result<Box<dyn Processor>> {
        let database = string_arg(args, "database", DEFAULT_DATABASE)?;
        let sync_database = string_arg(args, "sync_database", DEFAULT_SYNC_DATABASE)?;
        if database == sync_database {
            return Err(DbUpdatesError::Config(format!(
                "processor '{}' needs two distinct databases, got '{}' twice",
                name, database
            )));
        }
        if let (Ok(accounts), Ok(sync)) =
            (config.database(&database), config.database(&sync_database))
        {
            if accounts.file_identity() == sync.file_identity() {
                return Err(DbUpdatesError::Config(format!(
                    "processor '{}': databases '{}' and '{}' share the file {}",
                    name,
                    database,
                    sync_database,
                    accounts.path.display()
                )));
            }
        }
        Ok(Box::new(Self::new(name, config, database, sync_database)))
    }

    fn stores(&self) -> Result<&ProfileStores> {
        self.stores
            .as_ref()
            .ok_or_else(|| DbUpdatesError::NotStarted(self.name.clone()))
    }

    fn apply(&self, stores: &ProfileStores, record: &EventRecord) -> Result<()> {
        match record.key.as_str() {
            keys::PROFILE_UPDATE => self.apply_update(stores, record),
            other => Err(DbUpdatesError::UnknownKey(other.to_string())),
        }
    }

    fn apply_update(&self, stores: &ProfileStores, record: &EventRecord) -> Result<()> {
        let EventPayload::ProfileUpdate(update) = &record.payload else {
            return Err(payload_mismatch(record));
        };

        let (result, finalization) =
            with_transaction_outcome(&stores.accounts, &stores.sync, |accounts, sync| {
                let a = ops::upsert_profile(accounts.conn(), update, record.position)?;
                let s = ops::upsert_sync_profile(sync.conn(), update, record.position)?;
                Ok((a, s))
            });
        let (account_written, sync_written) = result?;

        if let Some(Finalization::Committed { failures }) = finalization {
            if failures > 0 {
                return Err(DbUpdatesError::Transaction(format!(
                    "commit failed on {} of 2 stores ('{}', '{}'); stores may disagree until redelivery",
                    failures,
                    stores.accounts.name(),
                    stores.sync.name()
                )));
            }
        }

        if !account_written || !sync_written {
            debug!(
                processor = %self.name,
                user_id = %update.user_id,
                position = record.position,
                account_written,
                sync_written,
                "Profile already at a later position"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Processor for ProfileProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ProcessorState {
        if self.stores.is_some() {
            ProcessorState::Started
        } else {
            ProcessorState::Constructed
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.stores.is_some() {
            return Err(DbUpdatesError::InvalidState(format!(
                "processor '{}' already started",
                self.name
            )));
        }

        let locator = StoreLocator::new(self.config.clone());
        let accounts = open_store(&self.name, &locator, &self.database, StoreKind::Accounts)?;
        let sync = open_store(&self.name, &locator, &self.sync_database, StoreKind::SyncApi)?;
        self.stores = Some(ProfileStores { accounts, sync });
        observe::record_processor_start(&self.name, true);
        Ok(())
    }

    async fn process(&self, cancel: &CancellationToken, batch: &[EventRecord]) -> Result<BatchReport> {
        let stores = self.stores()?;
        apply_each(&self.name, cancel, batch, |record| self.apply(stores, record))
    }
}
