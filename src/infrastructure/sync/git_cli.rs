//! Thin subprocess wrapper around the `git` executable.
//!
//! Grounded on the teacher crate's `infrastructure/sync/remote/transfer.rs`,
//! which shells out to `ssh`/`rsync` via `std::process::Command` with
//! piped/null stdio and inspects the exit status; generalised here to a
//! single `run` entry point used by every Git verb the Sync Engine needs.

use crate::error::{BackendError, BackendResult};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// One invocation of `git <args>` in `cwd`, with an optional
/// `GIT_SSH_COMMAND` for SSH key/known-hosts forwarding (§6 Remote endpoint).
pub struct GitCli {
    cwd: std::path::PathBuf,
    ssh_command: Option<String>,
}

impl GitCli {
    pub fn new(cwd: impl Into<std::path::PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ssh_command: None,
        }
    }

    pub fn with_ssh(mut self, key_path: Option<&Path>, known_hosts: Option<&Path>) -> Self {
        if let Some(key) = key_path {
            let key = crate::infrastructure::fs::expand_tilde(key);
            let mut cmd = format!("ssh -i {} -o IdentitiesOnly=yes", key.display());
            if let Some(hosts) = known_hosts {
                let hosts = crate::infrastructure::fs::expand_tilde(hosts);
                cmd.push_str(&format!(" -o UserKnownHostsFile={}", hosts.display()));
            }
            self.ssh_command = Some(cmd);
        }
        self
    }

    /// Run `git <args>`, returning stdout on success (trimmed of trailing
    /// newline) and a `SyncError` describing stderr on non-zero exit.
    pub fn run(&self, args: &[&str]) -> BackendResult<String> {
        debug!(args = ?args, cwd = %self.cwd.display(), "git invocation");

        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ssh_command) = &self.ssh_command {
            command.env("GIT_SSH_COMMAND", ssh_command);
        }

        let output = command.output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BackendError::SyncError(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )))
        }
    }

    /// Like `run`, but treat a non-zero exit as success if `stderr`
    /// contains `tolerate`. Used for "nothing to commit"/"already
    /// up to date" style non-failures the VCS reports via exit code.
    pub fn run_tolerating(&self, args: &[&str], tolerate: &str) -> BackendResult<Option<String>> {
        match self.run(args) {
            Ok(out) => Ok(Some(out)),
            Err(BackendError::SyncError(msg)) if msg.contains(tolerate) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fs::BACKEND_TEST_HOME_VAR;

    #[test]
    fn with_ssh_expands_tilde_in_key_and_known_hosts_paths() {
        unsafe {
            std::env::set_var(BACKEND_TEST_HOME_VAR, "/test/fake/home");
        }
        let cli = GitCli::new("/tmp").with_ssh(
            Some(Path::new("~/.ssh/id_ed25519")),
            Some(Path::new("~/.ssh/known_hosts")),
        );
        unsafe {
            std::env::remove_var(BACKEND_TEST_HOME_VAR);
        }
        let ssh_command = cli.ssh_command.expect("ssh command should be set");
        assert!(ssh_command.contains("/test/fake/home/.ssh/id_ed25519"));
        assert!(ssh_command.contains("/test/fake/home/.ssh/known_hosts"));
        assert!(!ssh_command.contains('~'));
    }

    #[test]
    fn without_ssh_key_leaves_ssh_command_unset() {
        let cli = GitCli::new("/tmp").with_ssh(None, None);
        assert!(cli.ssh_command.is_none());
    }
}
