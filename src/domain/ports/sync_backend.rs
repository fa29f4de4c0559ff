//! SyncBackend port - extends StorageBackend with push/pull/conflict
//! operations (§4.4). Only a Git-backed engine implements this; a plain
//! `LocalStore` implements `StorageBackend` alone.

use crate::domain::entities::SyncConflict;
use crate::domain::ports::storage_backend::StorageBackend;
use crate::error::BackendResult;

/// Bidirectional synchronisation capability layered on top of the core
/// file contract. "sync-capable extends file-capable": anything generic
/// over `impl SyncBackend` can also be used as `impl StorageBackend`.
pub trait SyncBackend: StorageBackend {
    /// Stage, commit (if needed), and push the bound branch. See §4.4.3.
    fn push(&self, message: Option<&str>) -> BackendResult<()>;

    /// Fetch and merge the bound branch from `origin`. See §4.4.4.
    fn pull(&self) -> BackendResult<()>;

    /// `pull` then `push`.
    fn sync(&self, message: Option<&str>) -> BackendResult<()> {
        self.pull()?;
        self.push(message)
    }

    /// List paths the VCS currently reports as unmerged. See §4.4.5.
    fn conflict_report(&self) -> BackendResult<Vec<SyncConflict>>;

    /// Resolve a conflict by taking the local ("ours") side.
    fn conflict_accept_local(&self, path: &str) -> BackendResult<()>;

    /// Resolve a conflict by taking the remote ("theirs") side.
    fn conflict_accept_remote(&self, path: &str) -> BackendResult<()>;

    /// Resolve a conflict by overwriting with caller-supplied data.
    fn conflict_resolve(&self, path: &str, data: &[u8]) -> BackendResult<()>;
}
