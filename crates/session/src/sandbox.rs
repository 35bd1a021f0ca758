use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SessionError};
use crate::state::SessionState;

/// Resolve a user-supplied path against the session, enforcing the sandbox.
///
/// Relative paths join against the session cwd. The result is canonicalized
/// (symlinks and `..` collapsed) and must stay at or under the session root.
/// The final component may not exist yet (file creation needs that), but
/// every existing ancestor is resolved through the real filesystem, so a
/// symlink cannot smuggle the path outside the root.
pub fn resolve_path(state: &SessionState, raw: &str) -> Result<PathBuf> {
    let requested = Path::new(raw);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        state.cwd().join(requested)
    };

    let normalized = normalize_lexically(&joined);
    let resolved = canonicalize_existing_prefix(&normalized)?;

    if resolved == state.root() || resolved.starts_with(state.root()) {
        Ok(resolved)
    } else {
        Err(SessionError::PathEscape(raw.to_string()))
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping above the filesystem root leaves the path at `/`;
                // the containment check rejects it afterwards.
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the remainder.
fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }

    let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
    let mut ancestor = path;
    loop {
        match ancestor.parent() {
            Some(parent) => {
                if let Some(name) = ancestor.file_name() {
                    missing.push(name);
                }
                if let Ok(canonical) = parent.canonicalize() {
                    let mut resolved = canonical;
                    for name in missing.into_iter().rev() {
                        resolved.push(name);
                    }
                    return Ok(resolved);
                }
                ancestor = parent;
            }
            None => {
                return Err(SessionError::NotFound(path.display().to_string()));
            }
        }
    }
}
