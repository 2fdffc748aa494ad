//! Namespace processors against real SQLite stores

mod common;

use common::*;
use dbupdates::prelude::*;
use dbupdates::{keys, processors, StoreConfig, StoreKind};
use dbupdates_sqlite::ops;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_room_state_later_event_replaces_earlier() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);
    let cancel = CancellationToken::new();

    let report = processor
        .process(&cancel, &[room_state("R1", "E1", "first", 42)])
        .await
        .unwrap();
    assert_eq!(report.applied, 1);

    processor
        .process(&cancel, &[room_state("R1", "E2", "second", 43)])
        .await
        .unwrap();

    let rows = fx
        .store("syncapi")
        .with_conn(|conn| ops::current_room_state(conn, "R1"))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_id, "E2");
    assert_eq!(rows[0].position, 43);
    assert!(rows[0].event_json.contains("second"));
}

#[tokio::test]
async fn test_unknown_key_is_skipped_without_mutation() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);

    let mut record = room_state("R1", "E1", "first", 7);
    record.key = "room-state-teleport".into();

    let report = processor
        .process(&CancellationToken::new(), &[record])
        .await
        .unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.applied, 0);

    let rows = fx
        .store("syncapi")
        .with_conn(|conn| ops::current_room_state(conn, "R1"))
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_failed_record_does_not_stop_batch() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);

    // Empty room id violates the table constraint
    let batch = vec![
        room_state("R1", "E1", "one", 1),
        room_state("", "E2", "broken", 2),
        membership("R2", "E3", "@alice:example.org", 3),
    ];
    let report = processor
        .process(&CancellationToken::new(), &batch)
        .await
        .unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);

    let store = fx.store("syncapi");
    let r1 = store
        .with_conn(|conn| ops::current_room_state(conn, "R1"))
        .unwrap();
    let r2 = store
        .with_conn(|conn| ops::current_room_state(conn, "R2"))
        .unwrap();
    assert_eq!(r1.len(), 1);
    assert_eq!(r2.len(), 1);
    assert_eq!(r2[0].membership.as_deref(), Some("join"));
}

#[tokio::test]
async fn test_payload_mismatch_counts_as_failure() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);

    let mut record = profile("@alice:example.org", "Alice", 5);
    record.key = keys::ROOM_STATE_UPDATE.into();

    let report = processor
        .process(&CancellationToken::new(), &[record])
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn test_final_state_independent_of_batch_grouping() {
    let records = vec![
        room_state("R1", "E1", "a", 10),
        membership("R1", "E2", "@alice:example.org", 11),
        room_state("R1", "E3", "b", 12),
        room_state("R1", "E4", "c", 13),
    ];

    let whole = Fixture::new();
    whole
        .started(processors::room_state::NAME)
        .process(&CancellationToken::new(), &records)
        .await
        .unwrap();

    let split = Fixture::new();
    let processor = split.started(processors::room_state::NAME);
    for chunk in records.chunks(1) {
        processor
            .process(&CancellationToken::new(), chunk)
            .await
            .unwrap();
    }

    let read = |fx: &Fixture| {
        fx.store("syncapi")
            .with_conn(|conn| ops::current_room_state(conn, "R1"))
            .unwrap()
    };
    assert_eq!(read(&whole), read(&split));
    assert_eq!(read(&whole).len(), 2);
}

#[tokio::test]
async fn test_replayed_batch_is_idempotent() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);
    let batch = vec![
        room_state("R1", "E1", "a", 20),
        room_state("R1", "E2", "b", 21),
    ];

    processor
        .process(&CancellationToken::new(), &batch)
        .await
        .unwrap();
    let before = fx
        .store("syncapi")
        .with_conn(|conn| ops::current_room_state(conn, "R1"))
        .unwrap();

    let report = processor
        .process(&CancellationToken::new(), &batch)
        .await
        .unwrap();
    assert_eq!(report.failed, 0);

    let after = fx
        .store("syncapi")
        .with_conn(|conn| ops::current_room_state(conn, "R1"))
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].event_id, "E2");
}

#[tokio::test]
async fn test_older_record_does_not_overwrite_newer() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);

    processor
        .process(&CancellationToken::new(), &[room_state("R1", "E9", "new", 90)])
        .await
        .unwrap();
    let report = processor
        .process(&CancellationToken::new(), &[room_state("R1", "E1", "old", 10)])
        .await
        .unwrap();
    assert_eq!(report.applied, 1);

    let row = fx
        .store("syncapi")
        .with_conn(|conn| ops::room_state_entry(conn, "R1", "m.room.name", ""))
        .unwrap()
        .unwrap();
    assert_eq!(row.event_id, "E9");
}

#[tokio::test]
async fn test_cancelled_batch_reports_cancellation() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = processor
        .process(&cancel, &[room_state("R1", "E1", "a", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbUpdatesError::Cancelled));

    let rows = fx
        .store("syncapi")
        .with_conn(|conn| ops::current_room_state(conn, "R1"))
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_malformed_batches_rejected() {
    let fx = Fixture::new();
    let processor = fx.started(processors::room_state::NAME);
    let cancel = CancellationToken::new();

    let err = processor.process(&cancel, &[]).await.unwrap_err();
    assert!(matches!(err, DbUpdatesError::MalformedBatch(_)));

    let out_of_order = vec![room_state("R1", "E2", "b", 5), room_state("R1", "E1", "a", 4)];
    let err = processor.process(&cancel, &out_of_order).await.unwrap_err();
    assert!(matches!(err, DbUpdatesError::MalformedBatch(_)));
}

#[tokio::test]
async fn test_lifecycle_enforced() {
    let fx = Fixture::new();
    let mut processor = fx
        .registry
        .build(processors::room_state::NAME, fx.config.clone())
        .unwrap();
    assert_eq!(processor.state(), ProcessorState::Constructed);

    let err = processor
        .process(&CancellationToken::new(), &[room_state("R1", "E1", "a", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbUpdatesError::NotStarted(_)));

    processor.start().unwrap();
    assert_eq!(processor.state(), ProcessorState::Started);
    assert!(matches!(
        processor.start(),
        Err(DbUpdatesError::InvalidState(_))
    ));
}

#[test]
fn test_start_fails_on_missing_or_mismatched_database() {
    let fx = Fixture::new();

    let mut registry = ProcessorRegistry::new();
    registry
        .register(
            "rooms_on_accounts",
            processors::RoomStateProcessor::construct,
            Some(json!({"database": "accounts"})),
        )
        .unwrap();
    let mut wrong_kind = registry
        .build("rooms_on_accounts", fx.config.clone())
        .unwrap();
    assert!(matches!(wrong_kind.start(), Err(DbUpdatesError::Config(_))));
    assert_eq!(wrong_kind.state(), ProcessorState::Constructed);

    let mut missing = processors::SettingsProcessor::new("settings", fx.config.clone(), "nowhere");
    assert!(matches!(missing.start(), Err(DbUpdatesError::Config(_))));
}

#[tokio::test]
async fn test_profile_written_to_both_stores() {
    let fx = Fixture::new();
    let processor = fx.started(processors::profiles::NAME);

    let report = processor
        .process(
            &CancellationToken::new(),
            &[
                profile("@alice:example.org", "Alice", 1),
                profile("@alice:example.org", "Alice B", 2),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.applied, 2);

    let account = fx
        .store("accounts")
        .with_conn(|conn| ops::profile(conn, "@alice:example.org"))
        .unwrap()
        .unwrap();
    let sync = fx
        .store("syncapi")
        .with_conn(|conn| ops::sync_profile(conn, "@alice:example.org"))
        .unwrap()
        .unwrap();
    assert_eq!(account.display_name.as_deref(), Some("Alice B"));
    assert_eq!(account, sync);
}

#[tokio::test]
async fn test_profile_rolled_back_when_second_store_fails() {
    let fx = Fixture::new();
    let processor = fx.started(processors::profiles::NAME);

    fx.store("syncapi")
        .with_conn(|conn| {
            conn.execute_batch("DROP TABLE syncapi_user_profiles")
                .map_err(|e| DbUpdatesError::Store(e.to_string()))
        })
        .unwrap();

    let report = processor
        .process(
            &CancellationToken::new(),
            &[profile("@bob:example.org", "Bob", 3)],
        )
        .await
        .unwrap();
    assert_eq!(report.failed, 1);

    let account = fx
        .store("accounts")
        .with_conn(|conn| ops::profile(conn, "@bob:example.org"))
        .unwrap();
    assert!(account.is_none());
}

#[tokio::test]
async fn test_profile_commit_failure_counts_as_failed() {
    let fx = Fixture::with_config(|dir| {
        default_config(dir).with_database(
            "accounts",
            StoreConfig::new(StoreKind::Accounts, dir.join("accounts.db"))
                .with_wal_mode(false)
                .with_busy_timeout_ms(50),
        )
    });
    let processor = fx.started(processors::profiles::NAME);

    // An open read transaction keeps its shared lock, so COMMIT on the
    // accounts file cannot take the exclusive lock it needs.
    let reader = fx.store("accounts");
    reader
        .with_conn(|conn| {
            conn.execute_batch("BEGIN")
                .and_then(|_| {
                    conn.query_row("SELECT COUNT(*) FROM account_profiles", [], |row| {
                        row.get::<_, i64>(0)
                    })
                })
                .map_err(|e| DbUpdatesError::Store(e.to_string()))
        })
        .unwrap();

    let report = processor
        .process(
            &CancellationToken::new(),
            &[profile("@carol:example.org", "Carol", 5)],
        )
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.applied, 0);

    reader
        .with_conn(|conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(|e| DbUpdatesError::Store(e.to_string()))
        })
        .unwrap();

    let account = reader
        .with_conn(|conn| ops::profile(conn, "@carol:example.org"))
        .unwrap();
    assert!(account.is_none());
    let sync = fx
        .store("syncapi")
        .with_conn(|conn| ops::sync_profile(conn, "@carol:example.org"))
        .unwrap();
    assert!(sync.is_some());
}

#[test]
fn test_profile_processor_requires_distinct_databases() {
    let fx = Fixture::new();

    let entry = fx.registry.lookup(processors::profiles::NAME).unwrap();
    assert_eq!(
        entry.init_args(),
        Some(&json!({"database": "accounts", "sync_database": "syncapi"}))
    );

    let mut registry = ProcessorRegistry::new();
    registry
        .register(
            "profiles_single_store",
            processors::ProfileProcessor::construct,
            Some(json!({"database": "accounts", "sync_database": "accounts"})),
        )
        .unwrap();
    assert!(matches!(
        registry.build("profiles_single_store", fx.config.clone()),
        Err(DbUpdatesError::Config(_))
    ));

    let aliased = Fixture::with_config(|dir| {
        default_config(dir).with_database(
            "accounts_alias",
            StoreConfig::new(StoreKind::Accounts, dir.join("accounts.db")),
        )
    });
    registry
        .register(
            "profiles_aliased_store",
            processors::ProfileProcessor::construct,
            Some(json!({"database": "accounts", "sync_database": "accounts_alias"})),
        )
        .unwrap();
    assert!(matches!(
        registry.build("profiles_aliased_store", aliased.config.clone()),
        Err(DbUpdatesError::Config(_))
    ));
}

#[tokio::test]
async fn test_device_delete_leaves_tombstone() {
    let fx = Fixture::new();
    let processor = fx.started(processors::devices::NAME);
    let cancel = CancellationToken::new();

    processor
        .process(
            &cancel,
            &[
                device_upsert("@alice:example.org", "PHONE", 1),
                device_upsert("@alice:example.org", "LAPTOP", 2),
                device_delete("@alice:example.org", "PHONE", 3),
            ],
        )
        .await
        .unwrap();

    // Replayed upsert from before the delete
    let report = processor
        .process(&cancel, &[device_upsert("@alice:example.org", "PHONE", 1)])
        .await
        .unwrap();
    assert_eq!(report.applied, 1);

    let store = fx.store("devices");
    let active = store
        .with_conn(|conn| ops::active_devices(conn, "@alice:example.org"))
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].device_id, "LAPTOP");

    let phone = store
        .with_conn(|conn| ops::device(conn, "@alice:example.org", "PHONE"))
        .unwrap()
        .unwrap();
    assert!(phone.deleted);
    assert_eq!(phone.position, 3);

    // A newer upsert brings it back
    processor
        .process(&cancel, &[device_upsert("@alice:example.org", "PHONE", 4)])
        .await
        .unwrap();
    let phone = store
        .with_conn(|conn| ops::device(conn, "@alice:example.org", "PHONE"))
        .unwrap()
        .unwrap();
    assert!(!phone.deleted);
}

#[tokio::test]
async fn test_settings_stored_as_json() {
    let fx = Fixture::new();
    let processor = fx.started(processors::settings::NAME);

    let report = processor
        .process(
            &CancellationToken::new(),
            &[
                setting("@alice:example.org", "m.push_rules", json!({"enabled": true}), 1),
                setting("@alice:example.org", "m.theme", json!("dark"), 2),
                room_state("R1", "E1", "not a setting", 3),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);

    let rows = fx
        .store("accounts")
        .with_conn(|conn| ops::settings_for_user(conn, "@alice:example.org"))
        .unwrap();
    assert_eq!(rows.len(), 2);
    let push = rows.iter().find(|r| r.setting_key == "m.push_rules").unwrap();
    assert_eq!(push.value, json!({"enabled": true}));
}
