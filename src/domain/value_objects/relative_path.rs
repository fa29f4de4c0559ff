//! RelativePath value object - a caller-supplied path in POSIX form,
//! normalised but not yet resolved against a root.
//!
//! Root-aware resolution and the containment proof are C1's job
//! (`infrastructure::path_safety::resolve`, which calls `normalize` here
//! for its root-independent string-normalisation step); this type only
//! performs the root-independent half from §3: backslash folding and
//! leading-slash stripping. Keeping that split lets this be tested once,
//! independent of any particular root, instead of re-deriving
//! normalisation inline at every call site.

use crate::error::{BackendError, BackendResult, InvalidOperationKind};

/// A normalised, not-yet-resolved caller path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath(String);

impl RelativePath {
    /// Normalise `input` per §3: reject empty/whitespace-only, fold
    /// backslashes to forward slashes, and strip a single leading `/`
    /// (the MCP-style root-relative convention) down to `"."` if nothing
    /// remains.
    pub fn normalize(input: &str) -> BackendResult<Self> {
        if input.trim().is_empty() {
            return Err(BackendError::invalid(InvalidOperationKind::EmptyPath, input));
        }

        let slashed = input.replace('\\', "/");
        let stripped = slashed.trim_start_matches('/');
        let normalized = if stripped.is_empty() { "." } else { stripped };

        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RelativePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
