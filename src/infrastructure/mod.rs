//! Infrastructure Layer
//!
//! Concrete implementations of the domain ports. This layer handles all
//! I/O: disk access, advisory locking, and subprocess invocation of the
//! Git collaborator.
//!
//! ## Structure
//!
//! - `path_safety` - C1: root-relative path resolution and containment.
//! - `fs/` - C2: `LocalStore`, a plain-disk `StorageBackend`.
//! - `lock/` - C3: `ProcessLock`, the reentrant advisory lock.
//! - `sync/` - C4/C5: `GitSyncEngine` and its Session Policy.

pub mod fs;
pub mod lock;
pub mod path_safety;
pub mod sync;

pub use fs::LocalStore;
pub use lock::ProcessLock;
pub use sync::GitSyncEngine;
