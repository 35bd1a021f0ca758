use std::path::{Path, PathBuf};

use crate::thoughts::ThoughtLog;

/// Session phase. Discovery allows read-only navigation; locking the cwd
/// moves the session to Edit, which unlocks the write-capable tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Edit,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Edit => "edit",
        }
    }
}

/// Per-session state. `root` is fixed at creation; `cwd` stays inside it.
#[derive(Debug)]
pub struct SessionState {
    root: PathBuf,
    cwd: PathBuf,
    phase: Phase,
    git_root: Option<PathBuf>,
    pub thoughts: ThoughtLog,
}

impl SessionState {
    pub fn new(root: PathBuf) -> Self {
        let cwd = root.clone();
        Self {
            root,
            cwd,
            phase: Phase::Discovery,
            git_root: None,
            thoughts: ThoughtLog::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn git_root(&self) -> Option<&Path> {
        self.git_root.as_deref()
    }

    /// Move the cwd. The caller must have resolved `dir` through the sandbox.
    pub fn set_cwd(&mut self, dir: PathBuf) {
        debug_assert!(dir.starts_with(&self.root));
        self.cwd = dir;
    }

    /// Lock the cwd and enter the edit phase. Walks up from the cwd (staying
    /// inside the sandbox) looking for a `.git` directory so the diff tools
    /// know where the repo lives. Returns the discovered git root, if any.
    /// Locking an already-locked session is rejected by the caller.
    pub fn lock_cwd(&mut self) -> Option<PathBuf> {
        let mut dir: &Path = &self.cwd;
        let git_root = loop {
            if dir.join(".git").exists() {
                break Some(dir.to_path_buf());
            }
            match dir.parent() {
                Some(parent) if parent.starts_with(&self.root) => dir = parent,
                _ => break None,
            }
        };
        self.git_root = git_root.clone();
        self.phase = Phase::Edit;
        log::debug!(
            "session locked at {} (git root: {:?})",
            self.cwd.display(),
            self.git_root
        );
        git_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_session_starts_in_discovery_at_root() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let state = SessionState::new(root.clone());
        assert_eq!(state.phase(), Phase::Discovery);
        assert_eq!(state.cwd(), root.as_path());
        assert_eq!(state.root(), root.as_path());
    }

    #[test]
    fn lock_cwd_is_monotonic_and_finds_git_root() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();

        let mut state = SessionState::new(root.clone());
        state.set_cwd(root.join("src"));
        let git_root = state.lock_cwd();
        assert_eq!(state.phase(), Phase::Edit);
        assert_eq!(git_root.as_deref(), Some(root.as_path()));
        assert_eq!(state.git_root(), Some(root.as_path()));
    }

    #[test]
    fn lock_cwd_without_repo_reports_none() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let mut state = SessionState::new(root);
        assert_eq!(state.lock_cwd(), None);
        assert_eq!(state.phase(), Phase::Edit);
    }
}
