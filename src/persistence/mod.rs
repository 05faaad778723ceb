//! Save/load persistence with migration and rollback
//!
//! Features:
//! - Versioned JSON envelope around an opaque payload tree
//! - Optional LZ4 + base64 transport, detected on decode
//! - Ordered schema migrations with template defaulting
//! - Per-slot backup rotation before every overwrite
//! - Corruption detection (decode failure) distinct from empty slots

pub mod backup;
pub mod codec;
pub mod error;
pub mod migration;
pub mod record;
pub mod schema;
pub mod slots;

pub use backup::{BackupEntry, BackupKey, BackupRotator, BackupSelector};
pub use codec::Decoded;
pub use error::{StoreError, StoreResult};
pub use migration::{MigrationError, MigrationStep, SchemaMigrator};
pub use record::{Record, RecordSummary, SlotMetadata, ValidationError};
pub use schema::{CURRENT_VERSION, SchemaVersion};
pub use slots::{ExportFile, LoadOutcome, SlotStore, SlotSummary};
