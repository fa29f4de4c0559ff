//! Process Lock implementations.

mod process_lock;

pub use process_lock::ProcessLock;
