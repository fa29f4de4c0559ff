//! VectorStoreBackend port - the external contract of the auxiliary
//! remote vector-store collaborator (§6, §9 of the spec).
//!
//! This backend is explicitly out of scope for implementation: the spec
//! states only the shape of its contract, the way the teacher crate's
//! `SyncDestination` port states a contract without mandating a
//! transport. No default implementation is provided here.

use chrono::{DateTime, Utc};
use std::fmt;

/// Metadata attached to an uploaded file, mirroring `FileInfo`'s subset
/// that a vector-store collaborator is expected to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorStoreAttributes {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub encoding: Option<String>,
}

/// One page of a paginated listing.
///
/// Cursor-advance rule (resolves the open question in SPEC_FULL.md §9):
/// prefer `last_id` when the collaborator supplies one; otherwise fall
/// back to the `id` of the final element in `items`. Regardless of which
/// source produced the next cursor, `has_more = false` is authoritative
/// and listing must stop even if a cursor value is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorStorePage<T> {
    pub items: Vec<T>,
    pub last_id: Option<String>,
    pub has_more: bool,
}

impl<T> VectorStorePage<T> {
    /// The cursor to use for the next page request, or `None` if exhausted.
    pub fn next_cursor(&self, item_id: impl Fn(&T) -> &str) -> Option<String> {
        if !self.has_more {
            return None;
        }
        self.last_id
            .clone()
            .or_else(|| self.items.last().map(|item| item_id(item).to_string()))
    }
}

/// Error contract for vector-store operations.
#[derive(Debug, Clone)]
pub enum VectorStoreError {
    ConnectionError(String),
    NotFound(String),
    Other(String),
}

impl fmt::Display for VectorStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorStoreError::ConnectionError(msg) => write!(f, "connection error: {msg}"),
            VectorStoreError::NotFound(id) => write!(f, "not found: {id}"),
            VectorStoreError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for VectorStoreError {}

/// Contract for a remote vector-store collaborator substitutable for the
/// Sync Engine's remote. Uploads carry attributes/metadata; downloads are
/// by file identifier; listing is paginated by vector-store identifier.
///
/// Deliberately trait-only: implementing a concrete vector-store client
/// is outside this crate's scope (§1 Non-goals).
pub trait VectorStoreBackend: Send + Sync {
    fn upload(
        &self,
        vector_store_id: &str,
        data: &[u8],
        attributes: VectorStoreAttributes,
    ) -> Result<String, VectorStoreError>;

    fn download(&self, file_id: &str) -> Result<Vec<u8>, VectorStoreError>;

    fn list(
        &self,
        vector_store_id: &str,
        cursor: Option<&str>,
    ) -> Result<VectorStorePage<String>, VectorStoreError>;
}
