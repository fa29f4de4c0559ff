//! Domain Entities
//!
//! Core entities produced and consumed by the storage backend contract.

mod checksum;
mod conflict;
mod file_info;
mod lock_record;
mod session_state;

pub use checksum::ChecksumAlgorithm;
pub use conflict::SyncConflict;
pub use file_info::{FileInfo, FileType};
pub use lock_record::LockRecord;
pub use session_state::SessionState;
