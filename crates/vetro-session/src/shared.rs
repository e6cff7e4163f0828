//! Serialized access to session state.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::state::{SessionPatch, SessionState};
use crate::store::{BlobStore, BlobStoreExt, StoreError};

/// Store key of the user API key.
pub const API_KEY_ENTRY: &str = "vetro_api_key";

/// Store key of the preferences object.
pub const PREFERENCES_ENTRY: &str = "vetro_preferences";

/// Error from a session write.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to persist session: {0}")]
    Store(#[from] StoreError),
}

/// Session state shared by every caller in the process.
///
/// All reads and writes go through one mutex, so a read never interleaves
/// with a pending write. The store is read once, on first access; later
/// reads are served from the cache until [`reload`](Self::reload).
pub struct SharedState {
    store: Box<dyn BlobStore>,
    cache: Mutex<Option<SessionState>>,
}

impl SharedState {
    #[must_use]
    pub fn new(store: impl BlobStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            cache: Mutex::new(None),
        }
    }

    /// Current state.
    ///
    /// The first call reads the store; a missing or unreadable store yields
    /// the defaults. Never fails.
    pub fn load(&self) -> SessionState {
        let mut cache = self.lock();
        self.ensure_loaded(&mut cache).clone()
    }

    /// Drop the cache and read the store again.
    pub fn reload(&self) -> SessionState {
        let mut cache = self.lock();
        let state = self.read_store();
        *cache = Some(state.clone());
        state
    }

    /// Merge `patch` into the state and persist it.
    ///
    /// A blank API key clears the saved key. Each entry is written to the
    /// store before the cache takes it, so cache and store agree on every
    /// entry that was written when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first store failure. Entries written before it are kept.
    pub fn save(&self, patch: SessionPatch) -> Result<SessionState, SessionError> {
        let mut guard = self.lock();
        let current = self.ensure_loaded(&mut guard);

        if let Some(key) = patch.api_key {
            let key = key.trim();
            if key.is_empty() {
                self.store.remove(API_KEY_ENTRY)?;
                current.api_key = None;
                info!("Cleared saved API key");
            } else {
                self.store.set(API_KEY_ENTRY, key)?;
                current.api_key = Some(key.to_owned());
                info!("Saved API key");
            }
        }

        if !patch.preferences.is_empty() {
            let mut preferences = current.preferences.clone();
            preferences.extend(patch.preferences);
            self.store.set_json(PREFERENCES_ENTRY, &preferences)?;
            debug!("Saved preferences: {preferences:?}");
            current.preferences = preferences;
        }

        Ok(current.clone())
    }

    /// Remove the saved API key from cache and store.
    ///
    /// # Errors
    ///
    /// Returns the store failure; the cached key is kept in that case.
    pub fn clear_api_key(&self) -> Result<SessionState, SessionError> {
        self.save(SessionPatch::new().api_key(""))
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionState>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_loaded<'g>(
        &self,
        cache: &'g mut MutexGuard<'_, Option<SessionState>>,
    ) -> &'g mut SessionState {
        cache.get_or_insert_with(|| self.read_store())
    }

    fn read_store(&self) -> SessionState {
        let api_key = match self.store.get(API_KEY_ENTRY) {
            Ok(key) => key.filter(|k| !k.trim().is_empty()),
            Err(e) => {
                warn!("Could not read saved API key, using none: {e}");
                None
            }
        };
        let preferences = match self.store.get_json::<BTreeMap<String, String>>(PREFERENCES_ENTRY) {
            Ok(prefs) => prefs.unwrap_or_default(),
            Err(e) => {
                warn!("Could not read saved preferences, using defaults: {e}");
                BTreeMap::new()
            }
        };
        debug!(
            "Loaded session (api key {}, {} preference(s))",
            if api_key.is_some() { "set" } else { "unset" },
            preferences.len()
        );
        SessionState {
            api_key,
            preferences,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::file::FileBlobStore;
    use crate::state::KeyPreference;
    use crate::store::MemoryBlobStore;

    /// Counts reads and can be told to fail writes.
    #[derive(Clone, Default)]
    struct ProbeStore {
        inner: MemoryBlobStore,
        reads: Arc<AtomicUsize>,
        fail_writes: bool,
    }

    impl BlobStore for ProbeStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::InvalidKey(key.to_owned()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    /// Fails every operation.
    struct BrokenStore;

    impl BlobStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::InvalidKey(key.to_owned()))
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_owned()))
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_owned()))
        }
    }

    #[test]
    fn test_first_run_defaults() {
        let shared = SharedState::new(MemoryBlobStore::new());
        assert_eq!(shared.load(), SessionState::default());
    }

    #[test]
    fn test_broken_store_loads_defaults() {
        let shared = SharedState::new(BrokenStore);
        assert_eq!(shared.load(), SessionState::default());
    }

    #[test]
    fn test_save_then_load_observes_key() {
        let shared = SharedState::new(MemoryBlobStore::new());
        shared.save(SessionPatch::new().api_key("X")).unwrap();
        assert_eq!(shared.load().api_key.as_deref(), Some("X"));
    }

    #[test]
    fn test_load_after_save_needs_no_store_read() {
        let store = ProbeStore::default();
        let shared = SharedState::new(store.clone());

        shared.load();
        let reads = store.reads.load(Ordering::SeqCst);
        shared.save(SessionPatch::new().api_key("X")).unwrap();
        for _ in 0..3 {
            assert_eq!(shared.load().api_key.as_deref(), Some("X"));
        }
        assert_eq!(store.reads.load(Ordering::SeqCst), reads);
    }

    #[test]
    fn test_save_persists_to_store() {
        let store = MemoryBlobStore::new();
        let shared = SharedState::new(store.clone());
        shared
            .save(
                SessionPatch::new()
                    .api_key("  X  ")
                    .key_preference(KeyPreference::Backend),
            )
            .unwrap();

        assert_eq!(store.get(API_KEY_ENTRY).unwrap(), Some("X".to_owned()));
        let prefs: BTreeMap<String, String> = store.get_json(PREFERENCES_ENTRY).unwrap().unwrap();
        assert_eq!(prefs.get("key_preference").map(String::as_str), Some("backend"));
    }

    #[test]
    fn test_save_merges_preferences() {
        let shared = SharedState::new(MemoryBlobStore::new());
        shared.save(SessionPatch::new().preference("a", "1")).unwrap();
        shared.save(SessionPatch::new().preference("b", "2")).unwrap();
        let state = shared.save(SessionPatch::new().preference("a", "3")).unwrap();

        let expected = BTreeMap::from([
            ("a".to_owned(), "3".to_owned()),
            ("b".to_owned(), "2".to_owned()),
        ]);
        assert_eq!(state.preferences, expected);
        assert_eq!(shared.reload().preferences, expected);
    }

    #[test]
    fn test_preference_save_keeps_api_key() {
        let shared = SharedState::new(MemoryBlobStore::new());
        shared.save(SessionPatch::new().api_key("X")).unwrap();
        shared
            .save(SessionPatch::new().key_preference(KeyPreference::Backend))
            .unwrap();
        assert_eq!(shared.load().api_key.as_deref(), Some("X"));
    }

    #[test]
    fn test_clear_api_key() {
        let store = MemoryBlobStore::new();
        let shared = SharedState::new(store.clone());
        shared.save(SessionPatch::new().api_key("X")).unwrap();

        let state = shared.clear_api_key().unwrap();
        assert_eq!(state.api_key, None);
        assert_eq!(shared.load().api_key, None);
        assert_eq!(store.get(API_KEY_ENTRY).unwrap(), None);
    }

    #[test]
    fn test_failed_write_leaves_cache_unchanged() {
        let store = ProbeStore {
            fail_writes: true,
            ..ProbeStore::default()
        };
        let shared = SharedState::new(store);

        let result = shared.save(SessionPatch::new().api_key("X"));
        assert!(matches!(result, Err(SessionError::Store(_))));
        assert_eq!(shared.load().api_key, None);
    }

    #[test]
    fn test_existing_store_values_loaded() {
        let store = MemoryBlobStore::new();
        store.set(API_KEY_ENTRY, "persisted").unwrap();
        store.set(PREFERENCES_ENTRY, r#"{"key_preference":"backend"}"#).unwrap();

        let state = SharedState::new(store).load();
        assert_eq!(state.api_key.as_deref(), Some("persisted"));
        assert_eq!(state.key_preference(), KeyPreference::Backend);
    }

    #[test]
    fn test_malformed_preferences_fall_back() {
        let store = MemoryBlobStore::new();
        store.set(API_KEY_ENTRY, "persisted").unwrap();
        store.set(PREFERENCES_ENTRY, "[1, 2").unwrap();

        let state = SharedState::new(store).load();
        assert_eq!(state.api_key.as_deref(), Some("persisted"));
        assert!(state.preferences.is_empty());
    }

    #[test]
    fn test_reload_sees_external_changes() {
        let store = MemoryBlobStore::new();
        let shared = SharedState::new(store.clone());
        assert_eq!(shared.load().api_key, None);

        store.set(API_KEY_ENTRY, "external").unwrap();
        assert_eq!(shared.load().api_key, None);
        assert_eq!(shared.reload().api_key.as_deref(), Some("external"));
    }

    #[test]
    fn test_survives_new_instance_on_disk() {
        let tmp = TempDir::new().unwrap();
        SharedState::new(FileBlobStore::new(tmp.path()))
            .save(SessionPatch::new().api_key("X").preference("theme", "dark"))
            .unwrap();

        let state = SharedState::new(FileBlobStore::new(tmp.path())).load();
        assert_eq!(state.api_key.as_deref(), Some("X"));
        assert_eq!(state.preferences.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_concurrent_saves_lose_no_update() {
        let shared = Arc::new(SharedState::new(MemoryBlobStore::new()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared
                        .save(SessionPatch::new().preference(format!("p{i}"), i.to_string()))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.load().preferences.len(), 8);
        assert_eq!(shared.reload().preferences.len(), 8);
    }
}
