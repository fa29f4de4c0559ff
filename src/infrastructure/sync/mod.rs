//! Sync Engine (C4) and Session Policy (C5) implementations.

mod git_cli;
mod git_engine;
mod remote_url;

pub use git_engine::GitSyncEngine;
pub use remote_url::with_embedded_credentials;
