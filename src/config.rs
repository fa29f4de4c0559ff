//! Backend configuration (§1A, §3 `BackendConfig`).
//!
//! Follows the teacher crate's `Deserialize`-with-defaults idiom: every
//! optional field gets a `#[serde(default = "...")]` function, and the
//! struct as a whole gets a hand-written `Default` impl so construction
//! from a bare `BackendConfig { .. }` literal and construction from TOML
//! agree on defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::BackendResult;

fn default_branch() -> String {
    "main".to_string()
}

/// Construction-time configuration for a `GitSyncEngine`. Not part of the
/// caller-facing data model (§6) — this is the equivalent of the
/// teacher's `Config` struct separating deploy-time settings from domain
/// entities.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub remote_url: String,
    pub path: PathBuf,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default)]
    pub author_name: Option<String>,

    #[serde(default)]
    pub author_email: Option<String>,

    #[serde(default)]
    pub auto_pull: bool,

    #[serde(default)]
    pub auto_push: bool,

    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,

    #[serde(default)]
    pub known_hosts: Option<PathBuf>,

    #[serde(default)]
    pub basic_auth_user: Option<String>,

    #[serde(default)]
    pub basic_auth_password: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            remote_url: String::new(),
            path: PathBuf::new(),
            branch: default_branch(),
            author_name: None,
            author_email: None,
            auto_pull: false,
            auto_push: false,
            ssh_key_path: None,
            known_hosts: None,
            basic_auth_user: None,
            basic_auth_password: None,
        }
    }
}

impl BackendConfig {
    pub fn new(remote_url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: remote_url.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Load from a TOML file. A convenience on top of direct struct
    /// construction — nothing in the core requires a config file to exist.
    pub fn from_toml_file(path: &Path) -> BackendResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| crate::error::BackendError::SyncError(format!("invalid config: {e}")))
    }
}
