use dbupdates_core::{
    error::{DbUpdatesError, Result},
    types::{DeviceDelete, DeviceUpsert, Position},
};
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub user_id: String,
    pub device_id: String,
    pub display_name: Option<String>,
    pub last_seen_ts: Option<i64>,
    pub deleted: bool,
    pub position: Position,
}

impl DeviceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            device_id: row.get(1)?,
            display_name: row.get(2)?,
            last_seen_ts: row.get(3)?,
            deleted: row.get(4)?,
            position: row.get(5)?,
        })
    }
}

/// Create or refresh a device; a newer upsert also revives a deleted device
///
/// Absent fields keep the stored value on a live device. A revived device
/// starts from the upsert alone, so nothing carries over from the tombstone.
pub fn upsert_device(conn: &Connection, update: &DeviceUpsert, position: Position) -> Result<bool> {
    let written = conn
        .execute(
            "INSERT INTO device_devices
                (user_id, device_id, display_name, last_seen_ts, deleted, position)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT (user_id, device_id) DO UPDATE SET
                display_name = CASE WHEN deleted = 1 THEN excluded.display_name
                    ELSE COALESCE(excluded.display_name, display_name) END,
                last_seen_ts = CASE WHEN deleted = 1 THEN excluded.last_seen_ts
                    ELSE COALESCE(excluded.last_seen_ts, last_seen_ts) END,
                deleted = 0,
                position = excluded.position
             WHERE excluded.position >= position",
            params![
                update.user_id,
                update.device_id,
                update.display_name,
                update.last_seen_ts,
                position,
            ],
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    Ok(written > 0)
}

/// Mark a device deleted
///
/// The row stays behind as a tombstone carrying the delete's position, so a
/// replayed older upsert cannot bring the device back.
pub fn delete_device(conn: &Connection, delete: &DeviceDelete, position: Position) -> Result<bool> {
    let written = conn
        .execute(
            "INSERT INTO device_devices (user_id, device_id, deleted, position)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT (user_id, device_id) DO UPDATE SET
                deleted = 1,
                position = excluded.position
             WHERE excluded.position >= position",
            params![delete.user_id, delete.device_id, position],
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    Ok(written > 0)
}

/// Fetch a device row, tombstones included
pub fn device(conn: &Connection, user_id: &str, device_id: &str) -> Result<Option<DeviceRow>> {
    conn.query_row(
        "SELECT user_id, device_id, display_name, last_seen_ts, deleted, position
         FROM device_devices WHERE user_id = ?1 AND device_id = ?2",
        params![user_id, device_id],
        DeviceRow::from_row,
    )
    .optional()
    .map_err(|e| DbUpdatesError::Store(e.to_string()))
}

/// Devices of a user that are not deleted
pub fn active_devices(conn: &Connection, user_id: &str) -> Result<Vec<DeviceRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, device_id, display_name, last_seen_ts, deleted, position
             FROM device_devices
             WHERE user_id = ?1 AND deleted = 0
             ORDER BY device_id",
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    let rows = stmt
        .query_map([user_id], DeviceRow::from_row)
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DbUpdatesError::Store(e.to_string()))
}
