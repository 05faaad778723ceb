//! Slot store
//!
//! The facade everything else calls. Each slot's record lives under one
//! primary key; every overwrite first snapshots the old bytes through the
//! backup rotator. Failures are absorbed here: public operations return
//! `bool` or `Option` and log the cause, while the `try_*` variants expose
//! the underlying [`StoreError`].

use std::future::IntoFuture;
use std::io;

use serde::Serialize;

use super::backup::{BackupEntry, BackupRotator, BackupSelector};
use super::codec;
use super::error::{StoreError, StoreResult};
use super::migration::SchemaMigrator;
use super::record::{Record, RecordSummary, SlotMetadata};
use crate::config::{ConfigError, StoreConfig};
use crate::platform::{Clock, KeyValueBackend, SystemClock};

/// What `load` found in a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing stored under the slot's key.
    Missing,
    /// Bytes exist but do not decode to JSON.
    Corrupted,
    /// JSON decoded but failed validation or migration; this is the default
    /// template standing in for it.
    Substituted(Record),
    /// Decoded, validated and migrated to the current version.
    Loaded(Record),
}

impl LoadOutcome {
    /// The usable record, if any.
    pub fn into_record(self) -> Option<Record> {
        match self {
            LoadOutcome::Loaded(r) | LoadOutcome::Substituted(r) => Some(r),
            LoadOutcome::Missing | LoadOutcome::Corrupted => None,
        }
    }
}

/// One row of [`SlotStore::list_slots`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    pub slot: u32,
    pub exists: bool,
    pub corrupted: bool,
    pub backup_count: usize,
    pub summary: Option<RecordSummary>,
}

/// A pretty-printed record ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

pub struct SlotStore<B: KeyValueBackend, C: Clock = SystemClock> {
    backend: B,
    clock: C,
    config: StoreConfig,
    migrator: SchemaMigrator,
    rotator: BackupRotator,
}

impl<B: KeyValueBackend> SlotStore<B, SystemClock> {
    /// Store over `backend` using the wall clock. Fails if `config` is invalid.
    pub fn new(backend: B, config: StoreConfig) -> Result<Self, ConfigError> {
        Self::with_clock(backend, config, SystemClock)
    }
}

impl<B: KeyValueBackend, C: Clock> SlotStore<B, C> {
    /// Store with an explicit time source. The config is validated first so
    /// primary and backup keys can never collide.
    pub fn with_clock(backend: B, config: StoreConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let rotator = BackupRotator::new(config.backup_prefix.clone(), config.max_backups);
        Ok(Self {
            backend,
            clock,
            config,
            migrator: SchemaMigrator::default(),
            rotator,
        })
    }

    /// Replace the migration chain.
    pub fn with_migrator(mut self, migrator: SchemaMigrator) -> Self {
        self.migrator = migrator;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Migration chain applied on load and import.
    pub fn migrator(&self) -> &SchemaMigrator {
        &self.migrator
    }

    /// Underlying storage.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct mutable access to storage, bypassing backups.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Tear down the store and hand back its storage.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Key holding the slot's current record.
    pub fn primary_key(&self, slot: u32) -> String {
        self.config.primary_key(slot)
    }

    /// Fresh default-template record for `slot`.
    pub fn default_record(&self, slot: u32) -> Record {
        Record::new_default(slot, self.clock.now())
    }

    fn check_slot(&self, slot: u32) -> StoreResult<()> {
        if self.config.slot_in_range(slot) {
            Ok(())
        } else {
            Err(StoreError::SlotOutOfRange {
                slot,
                max: self.config.max_slots,
            })
        }
    }

    /// Back up whatever is in `slot`, then write `record` over it.
    ///
    /// Returns the record as stored (stamped save time and slot metadata).
    pub fn try_save(&mut self, record: &Record, slot: u32, compress: bool) -> StoreResult<Record> {
        self.check_slot(slot)?;
        let key = self.primary_key(slot);

        // The primary key is not touched until the backup write has landed.
        self.rotator
            .create_backup(&mut self.backend, &key, slot, self.clock.now_ms())?;

        let mut stamped = record.clone();
        stamped.last_saved_at = self.clock.now();
        stamped.slot_metadata = SlotMetadata {
            slot,
            compressed: compress,
            backup_count: self.rotator.count(&self.backend, slot),
        };

        let text = serde_json::to_string(&stamped)?;
        self.backend.put(&key, &codec::encode(&text, compress))?;
        log::info!(
            "Saved slot {} ({} bytes, compressed: {})",
            slot,
            text.len(),
            compress
        );
        Ok(stamped)
    }

    /// [`try_save`](Self::try_save), logging failures and reporting `false`.
    pub fn save(&mut self, record: &Record, slot: u32, compress: bool) -> bool {
        match self.try_save(record, slot, compress) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Save to slot {} failed: {}", slot, e);
                false
            }
        }
    }

    /// Decode, validate and migrate the slot's record.
    ///
    /// Only backend failures and out-of-range slots are errors; what was
    /// found in the slot is described by the [`LoadOutcome`].
    pub fn try_load(&self, slot: u32) -> StoreResult<LoadOutcome> {
        self.check_slot(slot)?;
        let Some(raw) = self.backend.get(&self.primary_key(slot))? else {
            return Ok(LoadOutcome::Missing);
        };

        let Some(doc) = codec::decode(&raw).into_value() else {
            log::warn!("Slot {} is corrupted: data does not decode", slot);
            return Ok(LoadOutcome::Corrupted);
        };

        let record = match Record::from_value(doc) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Slot {} failed validation ({}), using defaults", slot, e);
                return Ok(LoadOutcome::Substituted(self.default_record(slot)));
            }
        };

        match self.migrator.migrate(record) {
            Ok(record) => Ok(LoadOutcome::Loaded(record)),
            Err(e) => {
                log::warn!("Slot {} failed migration ({}), using defaults", slot, e);
                Ok(LoadOutcome::Substituted(self.default_record(slot)))
            }
        }
    }

    /// Like [`try_load`](Self::try_load) with backend failures reported as
    /// `Missing`.
    pub fn load_outcome(&self, slot: u32) -> LoadOutcome {
        self.try_load(slot).unwrap_or_else(|e| {
            log::error!("Load of slot {} failed: {}", slot, e);
            LoadOutcome::Missing
        })
    }

    /// The slot's record, `None` when empty, corrupted or unreachable.
    pub fn load(&self, slot: u32) -> Option<Record> {
        self.load_outcome(slot).into_record()
    }

    /// Whether the slot's primary key holds anything, decodable or not.
    pub fn slot_exists(&self, slot: u32) -> bool {
        self.config.slot_in_range(slot)
            && self
                .backend
                .contains(&self.primary_key(slot))
                .unwrap_or(false)
    }

    /// Remove the record and its backups, returning the backup count removed.
    pub fn try_delete_slot(&mut self, slot: u32) -> StoreResult<usize> {
        self.check_slot(slot)?;
        self.backend.remove(&self.primary_key(slot))?;
        let removed = self.rotator.delete_all(&mut self.backend, slot)?;
        log::info!("Deleted slot {} and {} backups", slot, removed);
        Ok(removed)
    }

    /// Remove the slot's record and every backup of it.
    pub fn delete_slot(&mut self, slot: u32) -> bool {
        self.try_delete_slot(slot)
            .map_err(|e| log::error!("Delete of slot {} failed: {}", slot, e))
            .is_ok()
    }

    /// Load `from` and save it into `to`, keeping its compression setting.
    pub fn try_copy_slot(&mut self, from: u32, to: u32) -> StoreResult<Record> {
        self.check_slot(to)?;
        let mut record = self
            .try_load(from)?
            .into_record()
            .ok_or(StoreError::EmptySlot(from))?;
        let compress = record.slot_metadata.compressed;
        record.slot_metadata.slot = to;
        self.try_save(&record, to, compress)
    }

    /// Copy `from` into `to`. The target's previous record is backed up.
    pub fn copy_slot(&mut self, from: u32, to: u32) -> bool {
        match self.try_copy_slot(from, to) {
            Ok(_) => {
                log::info!("Copied slot {} to slot {}", from, to);
                true
            }
            Err(e) => {
                log::error!("Copy of slot {} to {} failed: {}", from, to, e);
                false
            }
        }
    }

    /// Status of every slot in range.
    pub fn list_slots(&self) -> Vec<SlotSummary> {
        (1..=self.config.max_slots)
            .map(|slot| {
                let raw = self
                    .backend
                    .get(&self.primary_key(slot))
                    .unwrap_or_else(|e| {
                        log::warn!("Cannot read slot {}: {}", slot, e);
                        None
                    });
                let doc = raw.as_deref().map(|r| codec::decode(r).into_value());
                SlotSummary {
                    slot,
                    exists: raw.is_some(),
                    corrupted: matches!(doc, Some(None)),
                    backup_count: self.rotator.count(&self.backend, slot),
                    summary: doc.flatten().map(|d| RecordSummary::from_document(&d)),
                }
            })
            .collect()
    }

    /// Snapshot the slot now. Returns the backup timestamp, `None` if the
    /// slot is empty or the backup failed.
    pub fn create_backup(&mut self, slot: u32) -> Option<u64> {
        let result = self.check_slot(slot).and_then(|()| {
            let key = self.primary_key(slot);
            self.rotator
                .create_backup(&mut self.backend, &key, slot, self.clock.now_ms())
        });
        match result {
            Ok(key) => key.map(|k| k.timestamp),
            Err(e) => {
                log::error!("Backup of slot {} failed: {}", slot, e);
                None
            }
        }
    }

    /// Backups of `slot`, newest first.
    pub fn list_backups(&self, slot: u32) -> Vec<BackupEntry> {
        self.check_slot(slot)
            .and_then(|()| self.rotator.list_backups(&self.backend, slot))
            .unwrap_or_else(|e| {
                log::error!("Listing backups of slot {} failed: {}", slot, e);
                Vec::new()
            })
    }

    /// Overwrite the slot's record with a backup. Only ever caller-initiated;
    /// loading a corrupted slot never restores on its own.
    pub fn restore_backup(&mut self, slot: u32, selector: BackupSelector) -> bool {
        let result = self.check_slot(slot).and_then(|()| {
            let key = self.primary_key(slot);
            self.rotator
                .restore_backup(&mut self.backend, &key, slot, selector)
        });
        result
            .map_err(|e| log::warn!("Restore of slot {} failed: {}", slot, e))
            .is_ok()
    }

    /// Pretty-printed copy of the slot's record, named
    /// `save_slot<N>_<YYYY-MM-DD>.json`.
    pub fn export_slot(&self, slot: u32) -> Option<ExportFile> {
        let record = self.load(slot)?;
        let contents = serde_json::to_string_pretty(&record)
            .map_err(|e| log::error!("Export of slot {} failed: {}", slot, e))
            .ok()?;
        Some(ExportFile {
            file_name: format!(
                "save_slot{}_{}.json",
                slot,
                self.clock.now().format("%Y-%m-%d")
            ),
            contents,
        })
    }

    /// Parse, validate, migrate and save externally supplied record text.
    ///
    /// Unlike `load`, a document that fails validation or migration is
    /// rejected rather than replaced by defaults, so a bad import never
    /// clobbers the slot.
    pub fn try_import_text(&mut self, slot: u32, text: &str) -> StoreResult<Record> {
        self.check_slot(slot)?;
        let doc = serde_json::from_str(text).map_err(|_| StoreError::ImportNotJson)?;
        let mut record = self.migrator.migrate(Record::from_value(doc)?)?;
        record.slot_metadata.slot = slot;
        let compress = self.config.compress;
        self.try_save(&record, slot, compress)
    }

    /// [`try_import_text`](Self::try_import_text), logging failures.
    pub fn import_text(&mut self, slot: u32, text: &str) -> bool {
        match self.try_import_text(slot, text) {
            Ok(_) => {
                log::info!("Imported record into slot {}", slot);
                true
            }
            Err(e) => {
                log::warn!("Import into slot {} failed: {}", slot, e);
                false
            }
        }
    }

    /// Await `source` to completion, then import its text.
    pub async fn import<F>(&mut self, slot: u32, source: F) -> bool
    where
        F: IntoFuture<Output = io::Result<String>>,
    {
        match source.await {
            Ok(text) => self.import_text(slot, &text),
            Err(e) => {
                log::warn!("Import into slot {} failed: {}", slot, StoreError::from(e));
                false
            }
        }
    }
}
