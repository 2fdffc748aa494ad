use dbupdates_core::{
    config::StoreKind,
    error::{DbUpdatesError, Result},
};
use rusqlite::Connection;

const SYNC_API_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS syncapi_current_room_state (
        room_id TEXT NOT NULL CHECK (room_id <> ''),
        event_id TEXT NOT NULL CHECK (event_id <> ''),
        event_json TEXT NOT NULL,
        event_type TEXT NOT NULL,
        state_key TEXT NOT NULL,
        membership TEXT,
        position INTEGER NOT NULL,
        PRIMARY KEY (room_id, event_type, state_key)
    );
    CREATE INDEX IF NOT EXISTS idx_current_room_state_event_id
        ON syncapi_current_room_state(event_id);
    CREATE INDEX IF NOT EXISTS idx_current_room_state_membership
        ON syncapi_current_room_state(state_key, membership)
        WHERE event_type = 'm.room.member';

    CREATE TABLE IF NOT EXISTS syncapi_user_profiles (
        user_id TEXT PRIMARY KEY CHECK (user_id <> ''),
        display_name TEXT,
        avatar_url TEXT,
        position INTEGER NOT NULL
    );
";

const ACCOUNTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS account_profiles (
        user_id TEXT PRIMARY KEY CHECK (user_id <> ''),
        display_name TEXT,
        avatar_url TEXT,
        position INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS account_settings (
        user_id TEXT NOT NULL CHECK (user_id <> ''),
        setting_key TEXT NOT NULL CHECK (setting_key <> ''),
        value TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (user_id, setting_key)
    );
";

const DEVICES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS device_devices (
        user_id TEXT NOT NULL CHECK (user_id <> ''),
        device_id TEXT NOT NULL CHECK (device_id <> ''),
        display_name TEXT,
        last_seen_ts INTEGER,
        deleted INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL,
        PRIMARY KEY (user_id, device_id)
    );
";

/// Create the tables for `kind` if they do not exist yet
///
/// Schema evolution is handled outside this crate; this only bootstraps
/// empty databases.
pub fn init_schema(conn: &Connection, kind: StoreKind) -> Result<()> {
    let ddl = match kind {
        StoreKind::SyncApi => SYNC_API_SCHEMA,
        StoreKind::Accounts => ACCOUNTS_SCHEMA,
        StoreKind::Devices => DEVICES_SCHEMA,
    };

    conn.execute_batch(ddl)
        .map_err(|e| DbUpdatesError::Store(format!("init {} schema: {}", kind.as_str(), e)))
}
