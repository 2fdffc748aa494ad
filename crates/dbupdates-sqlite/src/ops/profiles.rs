use dbupdates_core::{
    error::{DbUpdatesError, Result},
    types::{Position, ProfileUpdate},
};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub position: Position,
}

// Absent fields in an update leave the stored value untouched.
const UPSERT_SET: &str = "
    ON CONFLICT (user_id) DO UPDATE SET
        display_name = COALESCE(excluded.display_name, display_name),
        avatar_url = COALESCE(excluded.avatar_url, avatar_url),
        position = excluded.position
    WHERE excluded.position >= position";

fn upsert_into(
    conn: &Connection,
    table: &str,
    update: &ProfileUpdate,
    position: Position,
) -> Result<bool> {
    let sql = format!(
        "INSERT INTO {table} (user_id, display_name, avatar_url, position)
         VALUES (?1, ?2, ?3, ?4) {UPSERT_SET}"
    );
    let written = conn
        .execute(
            &sql,
            params![update.user_id, update.display_name, update.avatar_url, position],
        )
        .map_err(|e| DbUpdatesError::Store(format!("{}: {}", table, e)))?;

    Ok(written > 0)
}

fn select_from(conn: &Connection, table: &str, user_id: &str) -> Result<Option<ProfileRow>> {
    let sql = format!(
        "SELECT user_id, display_name, avatar_url, position FROM {table} WHERE user_id = ?1"
    );
    conn.query_row(&sql, [user_id], |row| {
        Ok(ProfileRow {
            user_id: row.get(0)?,
            display_name: row.get(1)?,
            avatar_url: row.get(2)?,
            position: row.get(3)?,
        })
    })
    .optional()
    .map_err(|e| DbUpdatesError::Store(e.to_string()))
}

/// Write the authoritative profile row in the accounts store
pub fn upsert_profile(conn: &Connection, update: &ProfileUpdate, position: Position) -> Result<bool> {
    upsert_into(conn, "account_profiles", update, position)
}

/// Write the sync-side copy of a profile in the sync API store
pub fn upsert_sync_profile(
    conn: &Connection,
    update: &ProfileUpdate,
    position: Position,
) -> Result<bool> {
    upsert_into(conn, "syncapi_user_profiles", update, position)
}

pub fn profile(conn: &Connection, user_id: &str) -> Result<Option<ProfileRow>> {
    select_from(conn, "account_profiles", user_id)
}

pub fn sync_profile(conn: &Connection, user_id: &str) -> Result<Option<ProfileRow>> {
    select_from(conn, "syncapi_user_profiles", user_id)
}
