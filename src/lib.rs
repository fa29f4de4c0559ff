//! syncvault - a backend-agnostic file storage abstraction with a
//! synchronised Git-backed provider.
//!
//! A caller performs CRUD, streaming, checksumming, glob, metadata, and
//! bidirectional-sync operations against one contract (`StorageBackend`,
//! extended by `SyncBackend`); `LocalStore` targets a plain directory and
//! `GitSyncEngine` wraps one with a Git remote, conflict detection, and
//! an auto-pull/auto-push session policy.
//!
//! ```no_run
//! use syncvault::{LocalStore, StorageBackend};
//!
//! let store = LocalStore::new("/tmp/vault")?;
//! store.create("notes/today.md", Some(b"# hello"), false, false)?;
//! # Ok::<(), syncvault::BackendError>(())
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod logging;

pub use config::BackendConfig;
pub use domain::entities::{
    ChecksumAlgorithm, FileInfo, FileType, LockRecord, SessionState, SyncConflict,
};
pub use domain::ports::{
    ChunkSource, Content, SessionGuard, StorageBackend, SyncBackend, VectorStoreAttributes,
    VectorStoreBackend, VectorStoreError, VectorStorePage,
};
pub use domain::value_objects::RelativePath;
pub use error::{BackendError, BackendResult, InvalidOperationKind};
pub use infrastructure::{GitSyncEngine, LocalStore, ProcessLock};
