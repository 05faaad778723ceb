//! End-to-end behavior of the slot store through the public API.

use save_vault::persistence::SlotMetadata;
use save_vault::platform::ManualClock;
use save_vault::{
    BackupSelector, DirectoryBackend, KeyValueBackend, LoadOutcome, MemoryBackend, PathAccessor,
    Record, SchemaMigrator, SlotStore, StoreConfig,
};
use serde_json::json;

const T0: u64 = 1_717_243_200_000;

fn memory_store() -> (SlotStore<MemoryBackend, ManualClock>, ManualClock) {
    let clock = ManualClock::new(T0);
    let store = SlotStore::with_clock(MemoryBackend::new(), StoreConfig::default(), clock.clone())
        .unwrap();
    (store, clock)
}

fn with_level(store: &SlotStore<MemoryBackend, ManualClock>, level: u64) -> Record {
    let mut record = store.default_record(1);
    record.payload["profile"]["level"] = json!(level);
    record
}

#[test]
fn roundtrip_compressed_and_plain() {
    for compress in [true, false] {
        let (mut store, _) = memory_store();
        let mut record = with_level(&store, 42);
        record.payload["inventory"]["items"] = json!([{"id": "sword", "qty": 1}]);
        assert!(store.save(&record, 2, compress));

        let loaded = store.load(2).expect("saved slot loads");
        assert_eq!(loaded.payload, record.payload);
        assert_eq!(loaded.schema_version, "1.2.0");
        assert_eq!(
            loaded.slot_metadata,
            SlotMetadata {
                slot: 2,
                compressed: compress,
                backup_count: 0,
            }
        );
    }
}

#[test]
fn migrating_current_record_changes_nothing() {
    let (store, _) = memory_store();
    let migrator = SchemaMigrator::default();
    let record = store.default_record(1);
    let once = migrator.migrate(record.clone()).unwrap();
    assert_eq!(once.payload, record.payload);
    let twice = migrator.migrate(once.clone()).unwrap();
    assert_eq!(twice, once);
}

#[test]
fn backups_capped_and_oldest_evicted() {
    let (mut store, clock) = memory_store();
    for level in 1..=8 {
        assert!(store.save(&with_level(&store, level), 1, true));
        clock.advance(1_000);
    }

    let backups = store.list_backups(1);
    assert_eq!(backups.len(), 5);
    let stamps: Vec<u64> = backups.iter().map(|b| b.timestamp).collect();
    let expected: Vec<u64> = (3..=7).rev().map(|i| T0 + i * 1_000).collect();
    assert_eq!(stamps, expected);
    // newest backup holds the record saved just before the current one
    assert_eq!(backups[0].summary.level, Some(7));
    assert_eq!(backups[4].summary.level, Some(3));
}

#[test]
fn corrupted_slot_reads_as_none_and_is_not_auto_restored() {
    let (mut store, clock) = memory_store();
    store.save(&with_level(&store, 10), 1, true);
    clock.advance(1);
    store.save(&with_level(&store, 11), 1, true);

    let key = store.primary_key(1);
    store.backend_mut().put(&key, "!!not base64 or json!!").unwrap();
    assert_eq!(store.load_outcome(1), LoadOutcome::Corrupted);
    assert!(store.load(1).is_none());
    assert_eq!(store.list_backups(1).len(), 1);

    assert!(store.restore_backup(1, BackupSelector::Latest));
    assert_eq!(store.load(1).unwrap().payload["profile"]["level"], json!(10));
}

#[test]
fn restore_specific_backup() {
    let (mut store, clock) = memory_store();
    store.save(&with_level(&store, 1), 1, false);
    clock.advance(10);
    store.save(&with_level(&store, 2), 1, false);
    clock.advance(10);
    store.save(&with_level(&store, 3), 1, false);

    let oldest = store.list_backups(1).last().map(|b| b.timestamp).unwrap();
    assert!(store.restore_backup(1, BackupSelector::At(oldest)));
    assert_eq!(store.load(1).unwrap().payload["profile"]["level"], json!(1));
}

#[test]
fn path_operations() {
    let (mut store, _) = memory_store();
    let mut paths = PathAccessor::new(&mut store);

    assert!(paths.set("profile.name", json!("Rook"), 1));
    assert_eq!(paths.get("profile.name", 1), Some(json!("Rook")));
    assert!(paths.set("quests.active.q7.stage", json!(2), 1));
    assert_eq!(paths.get("quests.active", 1), Some(json!({"q7": {"stage": 2}})));
    assert_eq!(paths.get("quests.nowhere.deep", 1), None);

    assert_eq!(paths.increment("stats.newCounter", 1, 1), Some(json!(1)));
    assert_eq!(paths.increment("profile.gold", 50, 1), Some(json!(150)));
}

#[test]
fn story_aliases_stay_in_sync() {
    let (mut store, _) = memory_store();
    let mut paths = PathAccessor::new(&mut store);

    assert!(paths.set("story.currentChapter", json!(3), 1));
    assert_eq!(paths.get("storyProgress.currentChapter", 1), Some(json!(3)));

    assert!(paths.set("storyProgress.flags.bridgeRepaired", json!(true), 1));
    assert_eq!(paths.get("story.flags.bridgeRepaired", 1), Some(json!(true)));

    let record = store.load(1).unwrap();
    assert_eq!(record.payload["story"], record.payload["storyProgress"]);
}

#[test]
fn legacy_completed_map_normalized_on_load() {
    let (mut store, _) = memory_store();
    let key = store.primary_key(1);
    let legacy = json!({
        "schemaVersion": "0.9.0",
        "payload": {
            "profile": {"name": "Old", "xp": 250},
            "stats": {"wins": 4},
            "storyProgress": {"completedMissions": {"m1": true, "m2": false}}
        }
    });
    store.backend_mut().put(&key, &legacy.to_string()).unwrap();

    let record = store.load(1).unwrap();
    assert_eq!(record.schema_version, "1.2.0");
    let payload = &record.payload;
    assert_eq!(payload["storyProgress"]["completedMissions"], json!(["m1"]));
    assert_eq!(payload["story"]["completedMissions"], json!(["m1"]));
    assert_eq!(payload["profile"]["experience"], json!(250));
    assert_eq!(payload["stats"]["battlesWon"], json!(4));
    assert_eq!(payload["unlocks"]["areas"], json!(["village"]));
}

#[test]
fn directory_backend_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let backend = DirectoryBackend::open(dir.path()).unwrap();
        let mut store = SlotStore::new(backend, StoreConfig::default()).unwrap();
        let mut paths = PathAccessor::new(&mut store);
        assert!(paths.set("profile.level", json!(12), 3));
        assert!(paths.set("profile.level", json!(13), 3));
    }

    let backend = DirectoryBackend::open(dir.path()).unwrap();
    let store = SlotStore::new(backend, StoreConfig::default()).unwrap();
    assert_eq!(store.load(3).unwrap().payload["profile"]["level"], json!(13));
    assert_eq!(store.list_backups(3).len(), 1);

    let slots = store.list_slots();
    assert!(slots[2].exists);
    assert!(!slots[0].exists);
}

#[test]
fn export_then_import_into_another_slot() {
    let (mut store, _) = memory_store();
    store.save(&with_level(&store, 55), 1, true);
    let export = store.export_slot(1).unwrap();
    assert_eq!(export.file_name, "save_slot1_2024-06-01.json");

    assert!(store.import_text(3, &export.contents));
    let imported = store.load(3).unwrap();
    assert_eq!(imported.payload["profile"]["level"], json!(55));
    assert_eq!(imported.slot_metadata.slot, 3);
}

#[test]
fn indexed_writes_keep_existing_items() {
    let (mut store, _) = memory_store();
    let mut paths = PathAccessor::new(&mut store);

    assert!(paths.set("inventory.items", json!(["sword", "shield"]), 1));
    assert!(paths.set("inventory.items.3", json!("potion"), 1));
    assert_eq!(
        paths.get("inventory.items", 1),
        Some(json!(["sword", "shield", null, "potion"]))
    );

    assert!(!paths.set("unlocks.areas.label", json!("x"), 1));
    assert_eq!(paths.get("unlocks.areas", 1), Some(json!(["village"])));
}
