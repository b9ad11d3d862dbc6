use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::store::KeyValueStore;

/// The document's local copy, read on every render.
///
/// An empty slot, or one that does not hold JSON, reads as the default
/// document.
pub struct LocalStore<S> {
    store: S,
    key: String,
    default_document: JsonValue,
}

impl<S: KeyValueStore> LocalStore<S> {
    #[must_use]
    pub fn new(store: S, key: impl Into<String>, default_document: JsonValue) -> Self {
        Self {
            store,
            key: key.into(),
            default_document,
        }
    }

    /// Overwrites the local copy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backing store rejects the write.
    pub fn save(&self, document: &JsonValue) -> Result<(), Error> {
        let raw = serde_json::to_string(document)?;
        self.store.set(&self.key, &raw)
    }

    #[must_use]
    pub fn load(&self) -> JsonValue {
        self.stored().unwrap_or_else(|| self.default_document.clone())
    }

    /// Whether the slot holds a parsable document.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.stored().is_some()
    }

    /// Replaces the local copy with the default document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backing store rejects the write.
    pub fn reset(&self) -> Result<(), Error> {
        self.save(&self.default_document)
    }

    /// Changes the document `load` and `reset` fall back to.
    pub fn set_default_document(&mut self, document: JsonValue) {
        self.default_document = document;
    }

    fn stored(&self) -> Option<JsonValue> {
        let raw = self.store.get(&self.key)?;
        match serde_json::from_str(&raw) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "Stored document is not JSON, using default");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn local() -> (LocalStore<Arc<MemoryStore>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let local = LocalStore::new(store.clone(), "doc", json!({"todos": []}));
        (local, store)
    }

    #[test]
    fn empty_slot_reads_default() {
        let (local, _) = local();
        assert_eq!(local.load(), json!({"todos": []}));
        assert!(!local.is_initialized());
    }

    #[test]
    fn save_then_load() {
        let (local, _) = local();
        local.save(&json!({"todos": [{"text": "a"}]})).unwrap();
        assert_eq!(local.load(), json!({"todos": [{"text": "a"}]}));
    }

    #[test]
    fn garbage_reads_default() {
        let (local, store) = local();
        store.set("doc", "{not json").unwrap();
        assert_eq!(local.load(), json!({"todos": []}));
        assert!(!local.is_initialized());
    }

    #[test]
    fn reset_restores_default() {
        let (local, store) = local();
        local.save(&json!({"x": 1})).unwrap();
        local.reset().unwrap();
        assert_eq!(store.get("doc").as_deref(), Some(r#"{"todos":[]}"#));
    }
}
