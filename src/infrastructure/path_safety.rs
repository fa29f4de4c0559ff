//! Path Safety (C1) - resolve a caller-supplied path against a backend
//! root and prove containment, without requiring the target to exist.
//!
//! Grounded on the teacher crate's `domain/value_objects/path.rs`
//! (`SafePath`, lexical `..`-popping resolution, post-resolution
//! `starts_with` containment check); generalised here from prompt-layer
//! paths to an arbitrary backend root.

use crate::domain::value_objects::RelativePath;
use crate::error::{BackendError, BackendResult, InvalidOperationKind};
use std::path::{Component, Path, PathBuf};

/// Resolve `input` against `root` per §4.1: normalise, join, lexically
/// collapse `.`/`..`, then prove the result stays within `root`.
///
/// `root` itself must already be absolute; callers own ensuring that
/// (the backend root is canonicalised once at construction time).
pub fn resolve(root: &Path, input: &str) -> BackendResult<PathBuf> {
    let slashed = input.replace('\\', "/");
    let root_str = root.to_string_lossy();

    // §4.1 step 3's root-relative stripping only applies when the input
    // doesn't already begin with the absolute root; when it does, hand it
    // to `Path::join` as-is (an absolute argument makes `join` discard the
    // base entirely, so this accepts already-root-prefixed absolute inputs
    // unchanged). Otherwise the root-independent normalisation is
    // `RelativePath`'s job, shared with every other caller of it.
    let joined = if slashed.starts_with('/') && slashed.starts_with(root_str.as_ref()) {
        root.join(&slashed)
    } else {
        let relative = RelativePath::normalize(input)?;
        root.join(relative.as_str())
    };

    let lexical = lexically_resolve(&joined);

    if !is_contained(&lexical, root) {
        return Err(BackendError::invalid(
            InvalidOperationKind::PathOutsideRoot,
            input,
        ));
    }

    // A not-yet-existing leaf is expected (create/stream_write target a
    // path that doesn't exist yet), but any *ancestor* directory that does
    // exist may itself be a symlink pointing outside the root (e.g. a
    // pulled commit containing a symlink blob, or a pre-existing symlinked
    // directory). Resolve symlinks in the deepest existing ancestor and
    // re-check containment there, mirroring Python's
    // `Path.resolve(strict=False)`, which resolves through existing
    // ancestors even when the final component is missing.
    let real_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let real = canonicalize_through_existing_ancestor(&lexical);
    if !is_contained(&real, &real_root) {
        return Err(BackendError::invalid(
            InvalidOperationKind::PathOutsideRoot,
            input,
        ));
    }

    Ok(lexical)
}

/// Canonicalise the deepest existing ancestor of `path` and re-append the
/// (not-yet-existing) remaining components lexically. If `path` exists in
/// full, this is equivalent to `path.canonicalize()`.
fn canonicalize_through_existing_ancestor(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut existing = path;
    loop {
        if existing.exists() {
            break;
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    for component in missing.into_iter().rev() {
        resolved.push(component);
    }
    resolved
}

/// Collapse `.`/`..` components without touching the filesystem, so this
/// works for paths that don't exist yet. `..` past the path's own start
/// is simply dropped rather than propagated as a prefix; the containment
/// check below is what actually rejects escapes.
fn lexically_resolve(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_contained(candidate: &Path, root: &Path) -> bool {
    candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn joins_plain_relative_path() {
        let dir = tempdir().unwrap();
        let resolved = resolve(dir.path(), "doc.txt").unwrap();
        assert_eq!(resolved, dir.path().join("doc.txt"));
    }

    #[test]
    fn strips_leading_slash_as_root_relative() {
        let dir = tempdir().unwrap();
        let resolved = resolve(dir.path(), "/doc.txt").unwrap();
        assert_eq!(resolved, dir.path().join("doc.txt"));
    }

    #[test]
    fn rejects_traversal_escape() {
        let dir = tempdir().unwrap();
        let err = resolve(dir.path(), "../escape.txt").unwrap_err();
        assert!(matches!(
            err,
            BackendError::InvalidOperation {
                kind: InvalidOperationKind::PathOutsideRoot,
                ..
            }
        ));
    }

    #[test]
    fn rejects_deeply_nested_traversal_escape() {
        let dir = tempdir().unwrap();
        let err = resolve(dir.path(), "a/b/../../../escape.txt").unwrap_err();
        assert!(matches!(
            err,
            BackendError::InvalidOperation {
                kind: InvalidOperationKind::PathOutsideRoot,
                ..
            }
        ));
    }

    #[test]
    fn internal_traversal_that_stays_inside_root_is_allowed() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        let resolved = resolve(dir.path(), "a/../b.txt").unwrap();
        assert_eq!(resolved, dir.path().join("b.txt"));
    }

    #[test]
    fn rejects_empty_input() {
        let dir = tempdir().unwrap();
        let err = resolve(dir.path(), "   ").unwrap_err();
        assert!(matches!(
            err,
            BackendError::InvalidOperation {
                kind: InvalidOperationKind::EmptyPath,
                ..
            }
        ));
    }

    #[test]
    fn resolves_without_requiring_existence() {
        let dir = tempdir().unwrap();
        let resolved = resolve(dir.path(), "not/yet/created.txt").unwrap();
        assert_eq!(resolved, dir.path().join("not/yet/created.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape_for_existing_target() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"x").unwrap();
        let err = resolve(dir.path(), "link/secret.txt").unwrap_err();
        assert!(matches!(
            err,
            BackendError::InvalidOperation {
                kind: InvalidOperationKind::PathOutsideRoot,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape_through_existing_ancestor_for_not_yet_existing_leaf() {
        // A symlinked directory that already exists under the root, but
        // whose target leaf file does not exist yet — the escape must
        // still be caught even though `lexical.exists()` is false for the
        // leaf (e.g. a `create` targeting a new file inside a synced
        // symlinked directory).
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = resolve(dir.path(), "link/not_yet_created.txt").unwrap_err();
        assert!(matches!(
            err,
            BackendError::InvalidOperation {
                kind: InvalidOperationKind::PathOutsideRoot,
                ..
            }
        ));
        assert!(!outside.path().join("not_yet_created.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn allows_new_leaf_under_a_legitimate_existing_subdirectory() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let resolved = resolve(dir.path(), "sub/new.txt").unwrap();
        assert_eq!(resolved, dir.path().join("sub/new.txt"));
    }
}
