//! Persistent session state for Vetro tools.
//!
//! Holds the user's API key and preferences across runs. Everything goes
//! through [`SharedState`], which serializes access and keeps an in-process
//! cache in step with a [`BlobStore`]:
//!
//! - [`MemoryBlobStore`]: in-process store
//! - [`FileBlobStore`]: one file per entry under a directory
//!
//! # Example
//!
//! ```
//! use vetro_session::{MemoryBlobStore, SessionPatch, SharedState};
//!
//! let shared = SharedState::new(MemoryBlobStore::new());
//! shared.save(SessionPatch::new().api_key("secret")).unwrap();
//! assert_eq!(shared.load().effective_api_key(None).as_deref(), Some("secret"));
//! ```

mod file;
mod shared;
mod state;
mod store;

pub use file::FileBlobStore;
pub use shared::{API_KEY_ENTRY, PREFERENCES_ENTRY, SessionError, SharedState};
pub use state::{KEY_PREFERENCE, KeyPreference, SessionPatch, SessionState};
pub use store::{BlobStore, BlobStoreExt, MemoryBlobStore, StoreError};
