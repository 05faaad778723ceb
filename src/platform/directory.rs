//! File-per-key backend for native builds
//!
//! Each key maps to `<dir>/<key>.sav`. Writes go to a `.tmp` sibling first and
//! are renamed into place, so a crash mid-write never leaves a torn value
//! under the real key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BackendError, BackendResult, KeyValueBackend};

const VALUE_EXT: &str = "sav";
const TMP_EXT: &str = "tmp";

#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        log::debug!("Directory backend opened at {}", root.display());
        Ok(Self { root })
    }

    /// Directory holding the value files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> BackendResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(BackendError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{VALUE_EXT}")))
    }
}

impl KeyValueBackend for DirectoryBackend {
    fn put(&mut self, key: &str, value: &str) -> BackendResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(TMP_EXT);
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&mut self, key: &str) -> BackendResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot scan {}: {}", self.root.display(), e);
                return Box::new(std::iter::empty());
            }
        };

        Box::new(entries.filter_map(move |entry| {
            let path = entry.ok()?.path();
            if path.extension()?.to_str()? != VALUE_EXT {
                return None;
            }
            let key = path.file_stem()?.to_str()?;
            key.starts_with(prefix).then(|| key.to_string())
        }))
    }
}
