//! SessionGuard - the scoped handle returned by `sync_session`.
//!
//! A marker trait so `StorageBackend::sync_session` can return an
//! opaque `Box<dyn SessionGuard>` regardless of which concrete backend
//! produced it. All of the interesting behaviour (releasing the Process
//! Lock, and for sync-capable backends, the exit-time push and session
//! flag clear) lives in each implementation's `Drop` impl, which runs
//! when the guard goes out of scope on every exit path — success,
//! early return, or panic unwind.
pub trait SessionGuard: Send {}
