//! Store error type
//!
//! These stay inside the crate's `try_*` layer. The public `SlotStore`
//! operations log them and report `false` / `None` instead.

use thiserror::Error;

use super::migration::MigrationError;
use super::record::ValidationError;
use crate::platform::BackendError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("slot {slot} is outside 1..={max}")]
    SlotOutOfRange { slot: u32, max: u32 },

    #[error("slot {0} has no saved record")]
    EmptySlot(u32),

    #[error("slot {0} holds data that cannot be decoded")]
    Corrupted(u32),

    #[error("slot {0} has no backups")]
    NoBackups(u32),

    #[error("slot {slot} has no backup at {timestamp}")]
    BackupNotFound { slot: u32, timestamp: u64 },

    #[error("imported text is not JSON")]
    ImportNotJson,

    #[error("import source failed: {0}")]
    ImportRead(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
