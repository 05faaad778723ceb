//! Store configuration
//!
//! Key prefixes and capacity limits. Persisted as JSON next to the saves when
//! the CLI is given `--config`; every field falls back to its default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{BACKUP_PREFIX, MAX_BACKUPS, MAX_SLOTS, PRIMARY_PREFIX};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Primary record keys are `<primary_prefix>_slot<N>`
    pub primary_prefix: String,
    /// Backup keys are `<backup_prefix>_slot<N>_<timestamp>`
    pub backup_prefix: String,
    /// Valid slots are `1..=max_slots`
    pub max_slots: u32,
    /// Backups retained per slot
    pub max_backups: usize,
    /// Compress records written through path operations and imports
    pub compress: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_prefix: PRIMARY_PREFIX.to_string(),
            backup_prefix: BACKUP_PREFIX.to_string(),
            max_slots: MAX_SLOTS,
            max_backups: MAX_BACKUPS,
            compress: true,
        }
    }
}

impl StoreConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the config at `path`.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Load from `path`, using defaults when the file is missing or bad.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                log::info!("Loaded store config from {}", path.display());
                config
            }
            Err(e) => {
                log::info!("Using default store config ({e})");
                Self::default()
            }
        }
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("Store config saved to {}", path.display());
        Ok(())
    }

    /// Reject settings that would make key families collide or leave the
    /// store with no capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.max_slots == 0 {
            return invalid("maxSlots must be at least 1");
        }
        if self.max_backups == 0 {
            return invalid("maxBackups must be at least 1");
        }
        for prefix in [&self.primary_prefix, &self.backup_prefix] {
            if prefix.is_empty() {
                return invalid("key prefixes must not be empty");
            }
            if prefix.contains("_slot") {
                return invalid("key prefixes must not contain '_slot'");
            }
        }
        if self.primary_prefix.starts_with(&self.backup_prefix)
            || self.backup_prefix.starts_with(&self.primary_prefix)
        {
            return invalid("primary and backup prefixes must not overlap");
        }
        Ok(())
    }

    /// Key of the slot's current record.
    pub fn primary_key(&self, slot: u32) -> String {
        format!("{}_slot{}", self.primary_prefix, slot)
    }

    /// Whether `slot` is within `1..=max_slots`.
    pub fn slot_in_range(&self, slot: u32) -> bool {
        (1..=self.max_slots).contains(&slot)
    }
}
