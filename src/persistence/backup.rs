//! Timestamped backup rotation
//!
//! Before a slot's primary record is overwritten, its current bytes are copied
//! to `<prefix>_slot<N>_<timestamp_ms>`. Each slot keeps at most
//! `max_backups`; the oldest (smallest timestamp) is evicted first.

use serde::Serialize;

use super::codec;
use super::error::{StoreError, StoreResult};
use super::record::RecordSummary;
use crate::platform::KeyValueBackend;

/// Parsed form of a backup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BackupKey {
    pub slot: u32,
    pub timestamp: u64,
}

impl BackupKey {
    /// Key prefix shared by every backup of `slot`. The trailing `_` keeps
    /// slot 1 from matching slot 10.
    pub fn slot_prefix(prefix: &str, slot: u32) -> String {
        format!("{prefix}_slot{slot}_")
    }

    /// Storage key for this backup.
    pub fn encode(&self, prefix: &str) -> String {
        format!("{}{}", Self::slot_prefix(prefix, self.slot), self.timestamp)
    }

    /// Parse a key produced by [`encode`](Self::encode) with the same
    /// prefix. Anything else is `None`.
    pub fn parse(prefix: &str, key: &str) -> Option<Self> {
        let rest = key.strip_prefix(prefix)?.strip_prefix("_slot")?;
        let (slot, timestamp) = rest.split_once('_')?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(slot) || !digits(timestamp) {
            return None;
        }
        Some(Self {
            slot: slot.parse().ok()?,
            timestamp: timestamp.parse().ok()?,
        })
    }
}

/// Which backup to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupSelector {
    Latest,
    At(u64),
}

/// A stored backup with best-effort display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub slot: u32,
    pub timestamp: u64,
    #[serde(skip)]
    pub bytes: String,
    pub summary: RecordSummary,
}

#[derive(Debug, Clone)]
pub struct BackupRotator {
    prefix: String,
    max_backups: usize,
}

impl BackupRotator {
    /// Rotator writing `<prefix>_slot<N>_<ts>` keys, keeping at least one backup.
    pub fn new(prefix: impl Into<String>, max_backups: usize) -> Self {
        Self {
            prefix: prefix.into(),
            max_backups: max_backups.max(1),
        }
    }

    /// Backup keys for `slot`, oldest first.
    pub fn keys<B: KeyValueBackend + ?Sized>(&self, backend: &B, slot: u32) -> Vec<BackupKey> {
        let scan = BackupKey::slot_prefix(&self.prefix, slot);
        let mut keys: Vec<BackupKey> = backend
            .keys_with_prefix(&scan)
            .filter_map(|k| BackupKey::parse(&self.prefix, &k))
            .filter(|k| k.slot == slot)
            .collect();
        keys.sort();
        keys
    }

    /// Number of backups currently held for `slot`.
    pub fn count<B: KeyValueBackend + ?Sized>(&self, backend: &B, slot: u32) -> usize {
        self.keys(backend, slot).len()
    }

    /// Snapshot the bytes currently under `primary_key`.
    ///
    /// Returns `None` when there is nothing to back up. Timestamps are kept
    /// strictly increasing per slot, so a clock that stalls or steps back
    /// still yields a new key instead of overwriting an older backup.
    pub fn create_backup<B: KeyValueBackend + ?Sized>(
        &self,
        backend: &mut B,
        primary_key: &str,
        slot: u32,
        now_ms: u64,
    ) -> StoreResult<Option<BackupKey>> {
        let Some(bytes) = backend.get(primary_key)? else {
            return Ok(None);
        };

        let mut existing = self.keys(&*backend, slot);
        while existing.len() >= self.max_backups {
            let oldest = existing.remove(0);
            backend.remove(&oldest.encode(&self.prefix))?;
            log::debug!("Evicted backup {} of slot {}", oldest.timestamp, slot);
        }

        let timestamp = match existing.last() {
            Some(newest) if newest.timestamp >= now_ms => newest.timestamp + 1,
            _ => now_ms,
        };
        let key = BackupKey { slot, timestamp };
        backend.put(&key.encode(&self.prefix), &bytes)?;
        log::info!("Backed up slot {} at {}", slot, timestamp);
        Ok(Some(key))
    }

    /// All backups of `slot`, newest first.
    pub fn list_backups<B: KeyValueBackend + ?Sized>(
        &self,
        backend: &B,
        slot: u32,
    ) -> StoreResult<Vec<BackupEntry>> {
        let mut entries = Vec::new();
        for key in self.keys(backend, slot).into_iter().rev() {
            let Some(bytes) = backend.get(&key.encode(&self.prefix))? else {
                continue;
            };
            let summary = codec::decode(&bytes)
                .into_value()
                .map(|doc| RecordSummary::from_document(&doc))
                .unwrap_or_else(RecordSummary::unknown);
            entries.push(BackupEntry {
                slot,
                timestamp: key.timestamp,
                bytes,
                summary,
            });
        }
        Ok(entries)
    }

    /// Copy a backup's bytes over `primary_key`. Nothing is written when the
    /// requested backup does not exist.
    pub fn restore_backup<B: KeyValueBackend + ?Sized>(
        &self,
        backend: &mut B,
        primary_key: &str,
        slot: u32,
        selector: BackupSelector,
    ) -> StoreResult<BackupKey> {
        let keys = self.keys(&*backend, slot);
        let chosen = match selector {
            BackupSelector::Latest => keys.last().copied().ok_or(StoreError::NoBackups(slot))?,
            BackupSelector::At(timestamp) => keys
                .iter()
                .find(|k| k.timestamp == timestamp)
                .copied()
                .ok_or(StoreError::BackupNotFound { slot, timestamp })?,
        };

        let bytes = backend
            .get(&chosen.encode(&self.prefix))?
            .ok_or(StoreError::BackupNotFound {
                slot,
                timestamp: chosen.timestamp,
            })?;
        backend.put(primary_key, &bytes)?;
        log::info!("Restored slot {} from backup {}", slot, chosen.timestamp);
        Ok(chosen)
    }

    /// Remove every backup of `slot`, returning how many were removed.
    pub fn delete_all<B: KeyValueBackend + ?Sized>(
        &self,
        backend: &mut B,
        slot: u32,
    ) -> StoreResult<usize> {
        let keys = self.keys(&*backend, slot);
        for key in &keys {
            backend.remove(&key.encode(&self.prefix))?;
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryBackend;

    const PRIMARY: &str = "save_slot1";

    fn rotator() -> BackupRotator {
        BackupRotator::new("bk", 5)
    }

    #[test]
    fn test_key_roundtrip_and_rejects() {
        let key = BackupKey {
            slot: 3,
            timestamp: 1_700_000_000_123,
        };
        let encoded = key.encode("rpg_backup");
        assert_eq!(encoded, "rpg_backup_slot3_1700000000123");
        assert_eq!(BackupKey::parse("rpg_backup", &encoded), Some(key));

        assert_eq!(BackupKey::parse("rpg_backup", "rpg_backup_slot3_"), None);
        assert_eq!(BackupKey::parse("rpg_backup", "rpg_backup_slot3_12x"), None);
        assert_eq!(BackupKey::parse("rpg_backup", "rpg_save_slot3"), None);
        assert_eq!(BackupKey::parse("other", &encoded), None);
    }

    #[test]
    fn test_prefix_with_underscores_parses() {
        let key = BackupKey {
            slot: 2,
            timestamp: 99,
        };
        let encoded = key.encode("my_game_bk");
        assert_eq!(BackupKey::parse("my_game_bk", &encoded), Some(key));
    }

    #[test]
    fn test_nothing_to_back_up() {
        let mut backend = MemoryBackend::new();
        let created = rotator().create_backup(&mut backend, PRIMARY, 1, 10).unwrap();
        assert_eq!(created, None);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let mut backend = MemoryBackend::new();
        let rot = rotator();
        for i in 1..=7u64 {
            backend.put(PRIMARY, &format!("{{\"n\":{i}}}")).unwrap();
            rot.create_backup(&mut backend, PRIMARY, 1, i * 100).unwrap();
        }

        let list = rot.list_backups(&backend, 1).unwrap();
        let stamps: Vec<u64> = list.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![700, 600, 500, 400, 300]);
        assert_eq!(list[0].bytes, "{\"n\":7}");
    }

    #[test]
    fn test_stalled_clock_never_overwrites() {
        let mut backend = MemoryBackend::new();
        let rot = rotator();
        backend.put(PRIMARY, "a").unwrap();
        rot.create_backup(&mut backend, PRIMARY, 1, 500).unwrap();
        backend.put(PRIMARY, "b").unwrap();
        let second = rot.create_backup(&mut backend, PRIMARY, 1, 500).unwrap();
        backend.put(PRIMARY, "c").unwrap();
        let third = rot.create_backup(&mut backend, PRIMARY, 1, 100).unwrap();

        assert_eq!(second.map(|k| k.timestamp), Some(501));
        assert_eq!(third.map(|k| k.timestamp), Some(502));
        assert_eq!(rot.count(&backend, 1), 3);
    }

    #[test]
    fn test_slots_are_isolated() {
        let mut backend = MemoryBackend::new();
        let rot = rotator();
        backend.put("save_slot1", "one").unwrap();
        backend.put("save_slot10", "ten").unwrap();
        rot.create_backup(&mut backend, "save_slot1", 1, 1).unwrap();
        rot.create_backup(&mut backend, "save_slot10", 10, 2).unwrap();

        assert_eq!(rot.count(&backend, 1), 1);
        assert_eq!(rot.count(&backend, 10), 1);
        assert_eq!(rot.delete_all(&mut backend, 1).unwrap(), 1);
        assert_eq!(rot.count(&backend, 10), 1);
    }

    #[test]
    fn test_restore_selectors() {
        let mut backend = MemoryBackend::new();
        let rot = rotator();

        assert!(matches!(
            rot.restore_backup(&mut backend, PRIMARY, 1, BackupSelector::Latest),
            Err(StoreError::NoBackups(1))
        ));

        backend.put(PRIMARY, "first").unwrap();
        rot.create_backup(&mut backend, PRIMARY, 1, 10).unwrap();
        backend.put(PRIMARY, "second").unwrap();
        rot.create_backup(&mut backend, PRIMARY, 1, 20).unwrap();
        backend.put(PRIMARY, "third").unwrap();

        assert!(matches!(
            rot.restore_backup(&mut backend, PRIMARY, 1, BackupSelector::At(15)),
            Err(StoreError::BackupNotFound { timestamp: 15, .. })
        ));
        assert_eq!(backend.get(PRIMARY).unwrap().as_deref(), Some("third"));

        rot.restore_backup(&mut backend, PRIMARY, 1, BackupSelector::At(10)).unwrap();
        assert_eq!(backend.get(PRIMARY).unwrap().as_deref(), Some("first"));

        let latest = rot
            .restore_backup(&mut backend, PRIMARY, 1, BackupSelector::Latest)
            .unwrap();
        assert_eq!(latest.timestamp, 20);
        assert_eq!(backend.get(PRIMARY).unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_list_degrades_on_garbage() {
        let mut backend = MemoryBackend::new();
        let rot = rotator();
        backend.put(PRIMARY, "%%% not a save %%%").unwrap();
        rot.create_backup(&mut backend, PRIMARY, 1, 10).unwrap();

        let list = rot.list_backups(&backend, 1).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].summary, RecordSummary::unknown());
    }
}
