//! Room state command implementation

use anyhow::{Context, Result};
use dbupdates::{DbUpdatesConfig, StoreKind, StoreLocator};
use dbupdates_sqlite::ops;
use std::sync::Arc;

pub fn execute(config: Arc<DbUpdatesConfig>, database: &str, room_id: &str) -> Result<()> {
    let store = StoreLocator::new(config)
        .open_kind(database, StoreKind::SyncApi)
        .with_context(|| format!("Failed to open database '{}'", database))?;

    let rows = store
        .with_conn(|conn| ops::current_room_state(conn, room_id))
        .context("Failed to read room state")?;

    if rows.is_empty() {
        println!("No state for room {}", room_id);
        return Ok(());
    }

    println!("\nRoom {} ({} entries)", room_id, rows.len());
    println!("{}", "=".repeat(60));
    for row in rows {
        let state_key = if row.state_key.is_empty() {
            "\"\""
        } else {
            row.state_key.as_str()
        };
        print!(
            "  {:<24} {:<32} {} @{}",
            row.event_type, state_key, row.event_id, row.position
        );
        match row.membership {
            Some(membership) => println!(" ({})", membership),
            None => println!(),
        }
    }

    Ok(())
}
