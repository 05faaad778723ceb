//! In-memory backend
//!
//! Used by tests and for throwaway stores. Keys are kept ordered so prefix
//! scans are a range walk.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::{BackendError, BackendResult, KeyValueBackend};

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
    /// When set, every operation fails as if the device were gone
    unavailable: bool,
}

impl MemoryBackend {
    /// Empty, available store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an inaccessible device (or bring it back).
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self) -> BackendResult<()> {
        if self.unavailable {
            Err(BackendError::Unavailable("memory backend disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueBackend for MemoryBackend {
    fn put(&mut self, key: &str, value: &str) -> BackendResult<()> {
        self.check()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.check()?;
        Ok(self.entries.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> BackendResult<()> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        if self.unavailable {
            return Box::new(std::iter::empty());
        }
        Box::new(
            self.entries
                .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(move |(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone()),
        )
    }
}
