//! Home directory resolution with test isolation support.
//!
//! On Windows, `dirs::home_dir()` uses the Windows system API rather than
//! environment variables, so setting `HOME`/`USERPROFILE` in tests has no
//! effect there. `backend_home_dir()` checks a test-isolation environment
//! variable first and falls back to `dirs::home_dir()`, so config paths
//! that expand `~` (e.g. `ssh_key_path`) are testable on every platform.

use std::path::PathBuf;

/// Environment variable overriding the resolved home directory, for test
/// isolation (primarily so Windows CI doesn't need real profile state).
pub const BACKEND_TEST_HOME_VAR: &str = "SYNCVAULT_TEST_HOME";

pub fn backend_home_dir() -> Option<PathBuf> {
    std::env::var(BACKEND_TEST_HOME_VAR)
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

/// Expand a leading `~` or `~/...` to the resolved home directory.
/// Paths without a leading `~` pass through unchanged. Used for
/// `ssh_key_path`/`known_hosts` in `BackendConfig`, which are handed to
/// `git` as real filesystem paths and so must not retain a literal `~`.
pub fn expand_tilde(path: &std::path::Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if path_str == "~" || path_str.starts_with("~/") {
        if let Some(home) = backend_home_dir() {
            return home.join(path_str.strip_prefix("~/").unwrap_or(""));
        }
    }
    path.to_path_buf()
}
