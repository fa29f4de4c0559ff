//! FileInfo entity - an immutable snapshot of a path's metadata.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Kind of filesystem entry a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Other,
}

/// Immutable snapshot of a path's metadata as observed at one instant.
///
/// Never cached across operations: every producing operation (`info`,
/// `create`, `update`, `stream_write`) takes a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub file_type: FileType,
    pub permissions: Option<u32>,
    pub owner_uid: Option<u32>,
    pub owner_gid: Option<u32>,
    pub checksum: Option<String>,
    pub encoding: Option<String>,
}

impl FileInfo {
    /// `encoding` is `"utf-8"` iff the content decodes as valid UTF-8.
    pub const UTF8_ENCODING: &'static str = "utf-8";
}
