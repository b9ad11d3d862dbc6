use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value as JsonValue};

use crate::error::Error;
use crate::token::TokenBundle;

/// Durable string-keyed storage, shaped like browser `localStorage`.
///
/// Writes use overwrite semantics; concurrent writers are not coordinated
/// and the last write wins.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

impl<T: KeyValueStore> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }
}

/// In-process store. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk.
///
/// Every write rewrites the whole file. An unreadable or corrupt file reads
/// as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, JsonValue> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<JsonValue>(&raw) {
            Ok(JsonValue::Object(map)) => map,
            _ => {
                tracing::warn!(path = %self.path.display(), "Ignoring corrupt store file");
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, JsonValue>) -> Result<(), Error> {
        let raw = serde_json::to_string(map)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_map()
            .get(key)
            .and_then(|v| v.as_str())
            .map(ToOwned::to_owned)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map();
        map.insert(key.to_owned(), JsonValue::String(value.to_owned()));
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// The single durable slot holding the last-known [`TokenBundle`].
pub struct TokenStore<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> TokenStore<S> {
    #[must_use]
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Reads the stored bundle. Anything that is not a JSON object reads as absent.
    #[must_use]
    pub fn load(&self) -> Option<TokenBundle> {
        let raw = self.store.get(&self.key)?;
        match serde_json::from_str::<TokenBundle>(&raw) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "Ignoring unparsable token bundle");
                None
            }
        }
    }

    /// Persists `bundle`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backing store rejects the write.
    pub fn save(&self, bundle: &TokenBundle) -> Result<(), Error> {
        let raw = serde_json::to_string(bundle)?;
        self.store.set(&self.key, &raw)
    }

    /// Whether anything is stored in the slot, parsable or not.
    #[must_use]
    pub fn contains(&self) -> bool {
        self.store.get(&self.key).is_some()
    }

    /// Evicts the stored bundle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backing store rejects the delete.
    pub fn clear(&self) -> Result<(), Error> {
        self.store.remove(&self.key)
    }
}
