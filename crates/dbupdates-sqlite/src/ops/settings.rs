use dbupdates_core::{
    error::{DbUpdatesError, Result},
    types::{Position, SettingUpdate},
};
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct SettingRow {
    pub user_id: String,
    pub setting_key: String,
    pub value: serde_json::Value,
    pub position: Position,
}

impl SettingRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(2)?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            user_id: row.get(0)?,
            setting_key: row.get(1)?,
            value,
            position: row.get(3)?,
        })
    }
}

pub fn upsert_setting(conn: &Connection, update: &SettingUpdate, position: Position) -> Result<bool> {
    let value = serde_json::to_string(&update.value)?;
    let written = conn
        .execute(
            "INSERT INTO account_settings (user_id, setting_key, value, position)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, setting_key) DO UPDATE SET
                value = excluded.value,
                position = excluded.position
             WHERE excluded.position >= position",
            params![update.user_id, update.setting_key, value, position],
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    Ok(written > 0)
}

pub fn setting(conn: &Connection, user_id: &str, setting_key: &str) -> Result<Option<SettingRow>> {
    conn.query_row(
        "SELECT user_id, setting_key, value, position
         FROM account_settings WHERE user_id = ?1 AND setting_key = ?2",
        params![user_id, setting_key],
        SettingRow::from_row,
    )
    .optional()
    .map_err(|e| DbUpdatesError::Store(e.to_string()))
}

pub fn settings_for_user(conn: &Connection, user_id: &str) -> Result<Vec<SettingRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, setting_key, value, position
             FROM account_settings WHERE user_id = ?1 ORDER BY setting_key",
        )
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    let rows = stmt
        .query_map([user_id], SettingRow::from_row)
        .map_err(|e| DbUpdatesError::Store(e.to_string()))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DbUpdatesError::Store(e.to_string()))
}
