//! Key-value blob store seam.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error from a [`BlobStore`] operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("store I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key cannot be represented by this store.
    #[error("invalid store key: '{0}'")]
    InvalidKey(String),

    /// Value could not be encoded or decoded.
    #[error("malformed value for '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent string store keyed by name.
///
/// Session state reaches persistence only through this trait.
pub trait BlobStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key has never been set.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// JSON convenience methods for [`BlobStore`].
pub trait BlobStoreExt: BlobStore {
    /// Read and deserialize a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] when the stored text is not valid
    /// JSON for `T`, or the underlying read error.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                key: key.to_owned(),
                source,
            })
    }

    /// Serialize and write a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] when `value` cannot be serialized,
    /// or the underlying write error.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Malformed {
            key: key.to_owned(),
            source,
        })?;
        self.set(key, &raw)
    }
}

impl<S: BlobStore + ?Sized> BlobStoreExt for S {}

/// In-process [`BlobStore`].
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_memory_set_get_remove() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_owned()));
        assert_eq!(store.len(), 1);

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_clones_share_entries() {
        let store = MemoryBlobStore::new();
        let other = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap(), Some("v".to_owned()));
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryBlobStore::new();
        let prefs = BTreeMap::from([("a".to_owned(), "1".to_owned())]);
        store.set_json("prefs", &prefs).unwrap();

        let loaded: Option<BTreeMap<String, String>> = store.get_json("prefs").unwrap();
        assert_eq!(loaded, Some(prefs));

        store.set("prefs", "{not json").unwrap();
        let result: Result<Option<BTreeMap<String, String>>, _> = store.get_json("prefs");
        assert!(matches!(result, Err(StoreError::Malformed { .. })));
    }
}
