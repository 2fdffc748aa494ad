use dbupdates_core::{
    error::{DbUpdatesError, Result},
    types::{Position, RoomStateUpdate},
};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// One row of a room's current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStateRow {
    pub room_id: String,
    pub event_id: String,
    pub event_json: String,
    pub event_type: String,
    pub state_key: String,
    pub membership: Option<String>,
    pub position: Position,
}

impl RoomStateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            room_id: row.get(0)?,
            event_id: row.get(1)?,
            event_json: row.get(2)?,
            event_type: row.get(3)?,
            state_key: row.get(4)?,
            membership: row.get(5)?,
            position: row.get(6)?,
        })
    }
}

/// Replace the current state entry for `(room_id, event_type, state_key)`
pub fn upsert_room_state(
    conn: &Connection,
    update: &RoomStateUpdate,
    position: Position,
) -> Result<bool> {
    let written = conn
        .execute(
            "INSERT INTO syncapi_current_room_state
                (room_id, event_id, event_json, event_type, state_key, membership, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (room_id, event_type, state_key) DO UPDATE SET
                event_id = excluded.event_id,
                event_json = excluded.event_json,
                membership = excluded.membership,
                position = excluded.position
             WHERE excluded.position >= syncapi_current_room_state.position",
            params![
                update.room_id,
                update.event_id,
                update.event_json,
                update.event_type,
                update.state_key,
                update.membership,
                position,
            ],
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    Ok(written > 0)
}

pub fn room_state_entry(
    conn: &Connection,
    room_id: &str,
    event_type: &str,
    state_key: &str,
) -> Result<Option<RoomStateRow>> {
    conn.query_row(
        "SELECT room_id, event_id, event_json, event_type, state_key, membership, position
         FROM syncapi_current_room_state
         WHERE room_id = ?1 AND event_type = ?2 AND state_key = ?3",
        params![room_id, event_type, state_key],
        RoomStateRow::from_row,
    )
    .optional()
    .map_err(|e| DbUpdatesError::Store(e.to_string()))
}

/// All current state rows of a room, ordered by position
pub fn current_room_state(conn: &Connection, room_id: &str) -> Result<Vec<RoomStateRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT room_id, event_id, event_json, event_type, state_key, membership, position
             FROM syncapi_current_room_state
             WHERE room_id = ?1
             ORDER BY position, event_type, state_key",
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    let rows = stmt
        .query_map([room_id], RoomStateRow::from_row)
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DbUpdatesError::Store(e.to_string()))
}
