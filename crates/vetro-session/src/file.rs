//! File-backed blob store.
//!
//! [`FileBlobStore`] keeps one file per key under a root directory:
//!
//! ```text
//! {root}/
//! +-- vetro_api_key        # raw value
//! +-- vetro_preferences    # JSON object
//! ```
//!
//! Writes go to a uniquely named temporary sibling first and are renamed
//! into place, so a reader never sees a half-written value. Entries are
//! readable by the owner only on unix.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::store::{BlobStore, StoreError};

/// [`BlobStore`] rooted at a directory on disk.
///
/// Entries that exist but cannot be read as UTF-8 text are treated as
/// missing.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open a store at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        key: key.to_owned(),
        source,
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                tracing::warn!("ignoring unreadable session entry {}: {e}", path.display());
                Ok(None)
            }
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|e| io_error(key, e))?;

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| io_error(key, e))?;
        tmp.write_all(value.as_bytes()).map_err(|e| io_error(key, e))?;
        tmp.persist(&path).map_err(|e| io_error(key, e.error))?;
        tracing::debug!("wrote session entry {}", path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_set_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlobStore::new(tmp.path().join("session"));

        store.set("vetro_api_key", "abc").unwrap();
        assert_eq!(store.get("vetro_api_key").unwrap(), Some("abc".to_owned()));
        assert!(tmp.path().join("session/vetro_api_key").is_file());
    }

    #[test]
    fn test_get_missing_root() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlobStore::new(tmp.path().join("nope"));
        assert_eq!(store.get("vetro_api_key").unwrap(), None);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlobStore::new(tmp.path());

        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("second".to_owned()));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_values_survive_new_handle() {
        let tmp = TempDir::new().unwrap();
        FileBlobStore::new(tmp.path()).set("k", "kept").unwrap();
        assert_eq!(
            FileBlobStore::new(tmp.path()).get("k").unwrap(),
            Some("kept".to_owned())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_entries_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = FileBlobStore::new(tmp.path());
        store.set("vetro_api_key", "secret").unwrap();

        let mode = fs::metadata(tmp.path().join("vetro_api_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_writers_leave_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlobStore::new(tmp.path());

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || store.set("k", &format!("value-{i}")).unwrap());
            }
        });

        let value = store.get("k").unwrap().unwrap();
        assert!(value.starts_with("value-"), "{value}");
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("k")]);
    }

    #[test]
    fn test_non_utf8_entry_reads_as_missing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("k"), [0xFF, 0xFE, 0x80]).unwrap();
        let store = FileBlobStore::new(tmp.path());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let tmp = TempDir::new().unwrap();
        let store = FileBlobStore::new(tmp.path());
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(store.set(key, "x"), Err(StoreError::InvalidKey(_))),
                "{key}"
            );
        }
    }
}
