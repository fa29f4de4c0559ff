//! Sync Engine (C4) - wraps a Local Store with a Git collaborator:
//! clone/configure bring-up, forwarded CRUD, push/pull protocols,
//! conflict reporting/resolution, and the Session Policy (C5).
//!
//! Grounded on the teacher crate's `sync::engine`, which also owns a
//! local working tree and drives an external transfer tool
//! (`infrastructure/sync/remote`) by subprocess; generalised here from a
//! one-way rsync/scp output writer to a bidirectional `git` collaborator
//! with a real conflict model.

use crate::config::BackendConfig;
use crate::domain::entities::{ChecksumAlgorithm, FileInfo, SessionState, SyncConflict};
use crate::domain::ports::chunk_source::ChunkSource;
use crate::domain::ports::session_guard::SessionGuard;
use crate::domain::ports::storage_backend::{Content, StorageBackend};
use crate::domain::ports::sync_backend::SyncBackend;
use crate::error::{BackendError, BackendResult};
use crate::infrastructure::fs::LocalStore;
use crate::infrastructure::sync::git_cli::GitCli;
use crate::infrastructure::sync::remote_url::with_embedded_credentials;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub struct GitSyncEngine {
    store: LocalStore,
    config: BackendConfig,
    session: SessionState,
}

impl GitSyncEngine {
    /// Bring-up per §4.4.1.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        if config.remote_url.trim().is_empty() {
            return Err(BackendError::invalid(
                crate::error::InvalidOperationKind::EmptyPath,
                "remote_url",
            ));
        }

        let path = &config.path;
        let git_dir = path.join(".git");

        if git_dir.exists() {
            let cli = GitCli::new(path);
            cli.run(&["remote", "set-url", "origin", &config.remote_url])
                .or_else(|_| cli.run(&["remote", "add", "origin", &config.remote_url]))?;
        } else if path.exists() && std::fs::read_dir(path)?.next().is_some() {
            return Err(BackendError::AlreadyExists(path.clone()));
        } else {
            std::fs::create_dir_all(path)?;
            let cli = GitCli::new(path.parent().unwrap_or(path));
            let url = with_embedded_credentials(
                &config.remote_url,
                config.basic_auth_user.as_deref(),
                config.basic_auth_password.as_deref(),
            );
            let dest = path.to_string_lossy().to_string();
            let single_branch = cli.run(&[
                "clone",
                "--single-branch",
                "--branch",
                &config.branch,
                &url,
                &dest,
            ]);
            if single_branch.is_err() {
                warn!(branch = %config.branch, "single-branch clone failed, retrying as full clone");
                cli.run(&["clone", &url, &dest])?;
            }
        }

        let cli = GitCli::new(path);
        let current_branch = cli.run(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();
        if current_branch != config.branch {
            if cli.run(&["checkout", &config.branch]).is_err() {
                cli.run(&["checkout", "-b", &config.branch])?;
            }
        }

        if let Some(name) = &config.author_name {
            cli.run(&["config", "user.name", name])?;
        }
        if let Some(email) = &config.author_email {
            cli.run(&["config", "user.email", email])?;
        }

        let store = LocalStore::new(path)?;

        Ok(Self {
            store,
            config,
            session: SessionState::new(),
        })
    }

    fn cli(&self) -> GitCli {
        GitCli::new(self.store.root())
            .with_ssh(self.config.ssh_key_path.as_deref(), self.config.known_hosts.as_deref())
    }

    fn auto_pull_if_needed(&self) -> BackendResult<()> {
        if self.config.auto_pull && !self.session.is_active() {
            self.pull()?;
        }
        Ok(())
    }

    fn auto_push_if_needed(&self, verb: &str, path: &str) -> BackendResult<()> {
        if self.config.auto_push && !self.session.is_active() {
            self.push(Some(&format!("{verb} {path}")))?;
        }
        Ok(())
    }
}

impl StorageBackend for GitSyncEngine {
    fn create(
        &self,
        path: &str,
        data: Option<&[u8]>,
        is_directory: bool,
        overwrite: bool,
    ) -> BackendResult<FileInfo> {
        let info = self.store.create(path, data, is_directory, overwrite)?;
        self.auto_push_if_needed("create", path)?;
        Ok(info)
    }

    fn read(&self, path: &str, binary: bool) -> BackendResult<Content> {
        self.auto_pull_if_needed()?;
        self.store.read(path, binary)
    }

    fn update(&self, path: &str, data: &[u8], append: bool) -> BackendResult<FileInfo> {
        let info = self.store.update(path, data, append)?;
        self.auto_push_if_needed("update", path)?;
        Ok(info)
    }

    fn delete(&self, path: &str, recursive: bool) -> BackendResult<()> {
        self.store.delete(path, recursive)?;
        self.auto_push_if_needed("delete", path)
    }

    fn info(&self, path: &str) -> BackendResult<FileInfo> {
        self.auto_pull_if_needed()?;
        self.store.info(path)
    }

    fn stream_read(
        &self,
        path: &str,
        chunk_size: usize,
        binary: bool,
    ) -> BackendResult<Box<dyn Iterator<Item = BackendResult<Content>>>> {
        self.auto_pull_if_needed()?;
        self.store.stream_read(path, chunk_size, binary)
    }

    fn stream_write(
        &self,
        path: &str,
        source: ChunkSource<'_>,
        chunk_size: usize,
        overwrite: bool,
    ) -> BackendResult<FileInfo> {
        let info = self.store.stream_write(path, source, chunk_size, overwrite)?;
        self.auto_push_if_needed("stream_write", path)?;
        Ok(info)
    }

    fn checksum(&self, path: &str, algorithm: ChecksumAlgorithm) -> BackendResult<String> {
        self.store.checksum(path, algorithm)
    }

    fn checksum_many(
        &self,
        paths: &[&str],
        algorithm: ChecksumAlgorithm,
    ) -> BackendResult<BTreeMap<String, String>> {
        self.store.checksum_many(paths, algorithm)
    }

    fn glob(&self, pattern: &str, include_dirs: bool) -> BackendResult<Vec<String>> {
        self.store.glob(pattern, include_dirs)
    }

    fn sync_session(&self, timeout: Option<Duration>) -> BackendResult<Box<dyn SessionGuard + '_>> {
        let lock_guard = self.store.sync_session(timeout)?;
        self.session.enter();
        if self.config.auto_pull {
            if let Err(e) = self.pull() {
                warn!(error = %e, "auto-pull on session entry failed");
            }
        }
        Ok(Box::new(SessionPolicyGuard {
            engine: self,
            _lock: lock_guard,
        }))
    }
}

impl SyncBackend for GitSyncEngine {
    fn push(&self, message: Option<&str>) -> BackendResult<()> {
        if !self.conflict_report()?.is_empty() {
            return Err(BackendError::SyncError(
                "cannot push with unresolved conflicts".to_string(),
            ));
        }

        let cli = self.cli();
        cli.run(&["add", "-A"])?;

        // `diff --cached --quiet` exits non-zero exactly when the index
        // differs from HEAD, so an `Err` here means "there is something
        // to commit", not an actual failure.
        let diff = cli.run(&["diff", "--cached", "--quiet"]);
        if diff.is_err() {
            let commit_message = message.unwrap_or("Sync changes");
            cli.run_tolerating(&["commit", "-m", commit_message], "nothing to commit")?;
        }

        let push_result = cli.run(&["push", "origin", &self.config.branch]);
        if let Err(e) = &push_result {
            let message = e.to_string();
            if message.contains("no upstream") || message.contains("has no upstream branch") {
                cli.run(&["push", "--set-upstream", "origin", &self.config.branch])?;
                return Ok(());
            }
            return push_result.map(|_| ());
        }
        debug!(branch = %self.config.branch, "push complete");
        Ok(())
    }

    fn pull(&self) -> BackendResult<()> {
        if !self.conflict_report()?.is_empty() {
            return Err(BackendError::SyncError(
                "cannot pull with unresolved conflicts".to_string(),
            ));
        }
        let cli = self.cli();
        let status = cli.run(&["status", "--porcelain"])?;
        if !status.trim().is_empty() {
            return Err(BackendError::SyncError(
                "cannot pull with a dirty working tree".to_string(),
            ));
        }

        cli.run(&["fetch", "origin", &self.config.branch])?;

        let remote_ref = format!("origin/{}", self.config.branch);
        if cli.run(&["rev-parse", "--verify", &remote_ref]).is_err() {
            return Ok(());
        }

        let merge = cli.run(&["merge", "--no-edit", &remote_ref]);
        match merge {
            Ok(_) => Ok(()),
            Err(e) => {
                let conflicts = self.conflict_report()?;
                if !conflicts.is_empty() {
                    Err(BackendError::SyncError(format!(
                        "merge conflict pulling {remote_ref}: {e}"
                    )))
                } else {
                    Err(e)
                }
            }
        }
    }

    fn conflict_report(&self) -> BackendResult<Vec<SyncConflict>> {
        let cli = self.cli();
        let status = cli.run(&["status", "--porcelain"])?;
        let mut conflicts = Vec::new();
        for line in status.lines() {
            if line.len() < 3 {
                continue;
            }
            let code = &line[..2];
            let path = line[3..].to_string();
            if SyncConflict::is_unresolved_status(code) {
                conflicts.push(SyncConflict::new(path, code.to_string()));
            }
        }
        Ok(conflicts)
    }

    fn conflict_accept_local(&self, path: &str) -> BackendResult<()> {
        self.require_conflicted(path)?;
        let cli = self.cli();
        cli.run(&["checkout", "--ours", "--", path])?;
        cli.run(&["add", "--", path])?;
        Ok(())
    }

    fn conflict_accept_remote(&self, path: &str) -> BackendResult<()> {
        self.require_conflicted(path)?;
        let cli = self.cli();
        cli.run(&["checkout", "--theirs", "--", path])?;
        cli.run(&["add", "--", path])?;
        Ok(())
    }

    fn conflict_resolve(&self, path: &str, data: &[u8]) -> BackendResult<()> {
        self.require_conflicted(path)?;
        self.store.update(path, data, false)?;
        self.cli().run(&["add", "--", path])?;
        Ok(())
    }
}

impl GitSyncEngine {
    fn require_conflicted(&self, path: &str) -> BackendResult<()> {
        let conflicts = self.conflict_report()?;
        if conflicts.iter().any(|c| c.path.to_string_lossy() == path) {
            Ok(())
        } else {
            Err(BackendError::SyncError(format!(
                "{path} is not an unresolved conflict"
            )))
        }
    }
}

/// Session Policy (C5) scoped handle: on drop, pushes once (if
/// `auto_push`) with the batch message, then unconditionally clears the
/// session flag before the inner lock guard releases the Process Lock.
struct SessionPolicyGuard<'a> {
    engine: &'a GitSyncEngine,
    _lock: Box<dyn SessionGuard + 'a>,
}

impl SessionGuard for SessionPolicyGuard<'_> {}

impl Drop for SessionPolicyGuard<'_> {
    fn drop(&mut self) {
        if self.engine.config.auto_push {
            if let Err(e) = self.engine.push(Some("Batch sync changes")) {
                warn!(error = %e, "auto-push on session exit failed");
            }
        }
        self.engine.session.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// `git init --bare` in a tempdir, addressed by a `file://` URL, so
    /// sync tests need no network access.
    fn bare_remote() -> (tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let cli = GitCli::new(dir.path());
        cli.run(&["init", "--bare", "--initial-branch", "main", "."])
            .unwrap();
        let url = format!("file://{}", dir.path().display());
        (dir, url)
    }

    fn clone_engine(remote_url: &str, workdir: &std::path::Path) -> GitSyncEngine {
        let mut config = BackendConfig::new(remote_url, workdir);
        config.author_name = Some("Test Bot".to_string());
        config.author_email = Some("test@example.com".to_string());
        GitSyncEngine::new(config).unwrap()
    }

    #[test]
    fn bring_up_clones_and_checks_out_branch() {
        let (_remote, url) = bare_remote();
        let workdir = tempdir().unwrap();
        let engine = clone_engine(&url, workdir.path());
        let branch = engine
            .cli()
            .run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .unwrap();
        assert_eq!(branch, "main");
    }

    #[test]
    fn create_then_push_then_second_clone_sees_it() {
        let (_remote, url) = bare_remote();

        let first_dir = tempdir().unwrap();
        let first = clone_engine(&url, first_dir.path());
        first.create("a.txt", Some(b"1"), false, false).unwrap();
        first.push(None).unwrap();

        let second_dir = tempdir().unwrap();
        let second = clone_engine(&url, second_dir.path());
        let content = second.read("a.txt", true).unwrap();
        assert_eq!(content.into_bytes(), b"1");
    }

    #[test]
    fn push_with_no_local_commits_is_a_no_op_success() {
        let (_remote, url) = bare_remote();
        let dir = tempdir().unwrap();
        let engine = clone_engine(&url, dir.path());
        engine.push(None).unwrap();
    }

    #[test]
    fn divergent_edit_surfaces_conflict_and_resolves() {
        let (_remote, url) = bare_remote();

        let a_dir = tempdir().unwrap();
        let a = clone_engine(&url, a_dir.path());
        a.create("shared.txt", Some(b"base"), false, false).unwrap();
        a.push(None).unwrap();

        let b_dir = tempdir().unwrap();
        let b = clone_engine(&url, b_dir.path());

        a.update("shared.txt", b"L", false).unwrap();
        a.push(None).unwrap();

        b.update("shared.txt", b"R", false).unwrap();
        let pull_err = b.pull();
        assert!(pull_err.is_err());

        let conflicts = b.conflict_report().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].path.to_string_lossy(), "shared.txt");

        b.conflict_resolve("shared.txt", b"M").unwrap();
        assert!(b.conflict_report().unwrap().is_empty());
        b.push(None).unwrap();
    }

    #[test]
    fn bring_up_refuses_to_clobber_nonempty_unrelated_directory() {
        let (_remote, url) = bare_remote();
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let config = BackendConfig::new(&url, dir.path());
        let err = GitSyncEngine::new(config).unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists(_)));
    }

    fn clone_engine_with_auto_sync(remote_url: &str, workdir: &std::path::Path) -> GitSyncEngine {
        let mut config = BackendConfig::new(remote_url, workdir);
        config.author_name = Some("Test Bot".to_string());
        config.author_email = Some("test@example.com".to_string());
        config.auto_pull = true;
        config.auto_push = true;
        GitSyncEngine::new(config).unwrap()
    }

    #[test]
    fn session_policy_batches_pull_at_entry_and_push_at_exit() {
        let (_remote, url) = bare_remote();

        let a_dir = tempdir().unwrap();
        let a = clone_engine(&url, a_dir.path());
        a.create("seed.txt", Some(b"0"), false, false).unwrap();
        a.push(None).unwrap();

        let b_dir = tempdir().unwrap();
        let b = clone_engine_with_auto_sync(&url, b_dir.path());

        {
            let _session = b.sync_session(None).unwrap();
            // Inside the session, per-operation auto-sync is suppressed:
            // neither of these writes pushes on its own.
            b.create("a.txt", Some(b"1"), false, false).unwrap();
            b.create("b.txt", Some(b"2"), false, false).unwrap();
            assert!(b.session.is_active());
        }
        // Session exit pushed the batch once; a third clone should see both files.
        let c_dir = tempdir().unwrap();
        let c = clone_engine(&url, c_dir.path());
        assert_eq!(c.read("a.txt", true).unwrap().into_bytes(), b"1");
        assert_eq!(c.read("b.txt", true).unwrap().into_bytes(), b"2");
        assert!(!b.session.is_active());
    }

    #[test]
    fn per_operation_auto_push_outside_a_session_pushes_immediately() {
        let (_remote, url) = bare_remote();

        let a_dir = tempdir().unwrap();
        let a = clone_engine_with_auto_sync(&url, a_dir.path());
        a.create("auto.txt", Some(b"x"), false, false).unwrap();

        let b_dir = tempdir().unwrap();
        let b = clone_engine(&url, b_dir.path());
        assert_eq!(b.read("auto.txt", true).unwrap().into_bytes(), b"x");
    }
}
