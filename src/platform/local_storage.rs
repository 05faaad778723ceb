//! Browser LocalStorage backend (WASM only)

use web_sys::Storage;

use super::{BackendError, BackendResult, KeyValueBackend};

pub struct LocalStorageBackend {
    storage: Storage,
}

impl LocalStorageBackend {
    /// Grab the window's LocalStorage. Fails when storage is disabled
    /// (private browsing, sandboxed iframes).
    pub fn open() -> BackendResult<Self> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| BackendError::Unavailable("LocalStorage not available".to_string()))?;
        log::info!("LocalStorage backend ready");
        Ok(Self { storage })
    }
}

fn js_err(e: wasm_bindgen::JsValue) -> BackendError {
    BackendError::Unavailable(format!("{e:?}"))
}

impl KeyValueBackend for LocalStorageBackend {
    fn put(&mut self, key: &str, value: &str) -> BackendResult<()> {
        self.storage.set_item(key, value).map_err(js_err)
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.storage.get_item(key).map_err(js_err)
    }

    fn remove(&mut self, key: &str) -> BackendResult<()> {
        self.storage.remove_item(key).map_err(js_err)
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        let len = self.storage.length().unwrap_or(0);
        Box::new(
            (0..len)
                .filter_map(move |i| self.storage.key(i).ok().flatten())
                .filter(move |k| k.starts_with(prefix)),
        )
    }
}
