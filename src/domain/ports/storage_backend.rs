//! StorageBackend port - the core file-operation contract (§4.2 of the spec).
//!
//! This is the boundary the domain layer programs against; `LocalStore`
//! and `GitSyncEngine` are the two infrastructure implementations.

use crate::domain::entities::{ChecksumAlgorithm, FileInfo};
use crate::domain::ports::chunk_source::ChunkSource;
use crate::domain::ports::session_guard::SessionGuard;
use crate::error::BackendResult;
use std::collections::BTreeMap;
use std::time::Duration;

/// Content returned by `read`/`stream_read`: raw bytes, or UTF-8 text when
/// the caller asked for `binary=false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bytes(Vec<u8>),
    Text(String),
}

impl Content {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Bytes(b) => b,
            Content::Text(s) => s.into_bytes(),
        }
    }
}

/// Core CRUD, streaming, checksum, and glob operations rooted at a
/// backend root. Implemented by `LocalStore` (plain disk) and, by
/// delegation, `GitSyncEngine` (disk plus sync).
pub trait StorageBackend: Send + Sync {
    /// Create a file or directory at `path`. See §4.2 `create`.
    fn create(
        &self,
        path: &str,
        data: Option<&[u8]>,
        is_directory: bool,
        overwrite: bool,
    ) -> BackendResult<FileInfo>;

    /// Read file content. See §4.2 `read`.
    fn read(&self, path: &str, binary: bool) -> BackendResult<Content>;

    /// Overwrite or append to an existing file. See §4.2 `update`.
    fn update(&self, path: &str, data: &[u8], append: bool) -> BackendResult<FileInfo>;

    /// Remove a file or directory. See §4.2 `delete`.
    fn delete(&self, path: &str, recursive: bool) -> BackendResult<()>;

    /// Snapshot a path's metadata. See §4.2 `info`.
    fn info(&self, path: &str) -> BackendResult<FileInfo>;

    /// Lazily read a file in fixed-size chunks. See §4.2 `stream_read`.
    fn stream_read(
        &self,
        path: &str,
        chunk_size: usize,
        binary: bool,
    ) -> BackendResult<Box<dyn Iterator<Item = BackendResult<Content>>>>;

    /// Consume a chunk source and write it sequentially to `path`. See
    /// §4.2 `stream_write`.
    fn stream_write(
        &self,
        path: &str,
        source: ChunkSource<'_>,
        chunk_size: usize,
        overwrite: bool,
    ) -> BackendResult<FileInfo>;

    /// Hex digest of a file's contents under `algorithm`. See §4.2 `checksum`.
    fn checksum(&self, path: &str, algorithm: ChecksumAlgorithm) -> BackendResult<String>;

    /// Best-effort digest of many paths; missing entries and directories
    /// are silently skipped. See §4.2 `checksum_many`.
    fn checksum_many(
        &self,
        paths: &[&str],
        algorithm: ChecksumAlgorithm,
    ) -> BackendResult<BTreeMap<String, String>>;

    /// Glob-match paths rooted at the backend root. See §4.2 `glob`.
    fn glob(&self, pattern: &str, include_dirs: bool) -> BackendResult<Vec<String>>;

    /// Acquire the Process Lock for the scope of the returned guard,
    /// blocking until acquired or `timeout` elapses. See §4.2 `sync_session`
    /// and §4.5 Session Policy.
    fn sync_session(&self, timeout: Option<Duration>) -> BackendResult<Box<dyn SessionGuard + '_>>;
}
