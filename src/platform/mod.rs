//! Platform abstraction layer
//!
//! Handles native/browser differences for:
//! - Storage (files on native, LocalStorage on web, memory for tests)
//! - Time (wall clock, or a manual clock for deterministic tests)
//!
//! Backends know nothing about slots, records or backups. They store opaque
//! text under string keys.

pub mod clock;
pub mod directory;
#[cfg(target_arch = "wasm32")]
pub mod local_storage;
pub mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::DirectoryBackend;
#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageBackend;
pub use memory::MemoryBackend;

use thiserror::Error;

/// Errors a storage backend can report.
///
/// A missing key is not an error: `get` returns `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The underlying device or store cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Key contains characters the backend cannot store.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Filesystem failure in a file-backed store.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Raw string-keyed text storage.
pub trait KeyValueBackend {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: &str) -> BackendResult<()>;

    /// Fetch the value under `key`, `None` if absent.
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&mut self, key: &str) -> BackendResult<()>;

    /// Lazily enumerate every key starting with `prefix`. Order is unspecified.
    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> Box<dyn Iterator<Item = String> + 'a>;

    /// Whether `key` currently holds a value.
    fn contains(&self, key: &str) -> BackendResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Box<B> {
    fn put(&mut self, key: &str, value: &str) -> BackendResult<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        (**self).get(key)
    }

    fn remove(&mut self, key: &str) -> BackendResult<()> {
        (**self).remove(key)
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        (**self).keys_with_prefix(prefix)
    }
}
