//! Save Vault - versioned local save slots for games
//!
//! Core modules:
//! - `platform`: Storage backends (memory, directory, LocalStorage) and clocks
//! - `persistence`: Record envelope, codec, migrations, backups, slot store
//! - `tree`: Dot-path helpers over `serde_json::Value`
//! - `accessor`: Path get/set/increment on a slot's payload
//! - `config`: Key prefixes and capacity limits

pub mod accessor;
pub mod config;
pub mod persistence;
pub mod platform;
pub mod tree;

pub use accessor::PathAccessor;
pub use config::StoreConfig;
pub use persistence::{
    BackupEntry, BackupSelector, LoadOutcome, Record, SchemaMigrator, SlotStore, SlotSummary,
};
pub use platform::{Clock, DirectoryBackend, KeyValueBackend, MemoryBackend, SystemClock};

/// Store defaults
pub mod consts {
    /// Number of save slots (slots are 1-based)
    pub const MAX_SLOTS: u32 = 3;
    /// Backups kept per slot
    pub const MAX_BACKUPS: usize = 5;
    /// Slot used when the caller does not pick one
    pub const DEFAULT_SLOT: u32 = 1;

    /// Key family prefixes. Neither may be a prefix of the other.
    pub const PRIMARY_PREFIX: &str = "rpg_save";
    pub const BACKUP_PREFIX: &str = "rpg_backup";

    /// Largest record a compressed transport may inflate to (16 MiB)
    pub const MAX_DECOMPRESSED_BYTES: usize = 16 * 1024 * 1024;
}
