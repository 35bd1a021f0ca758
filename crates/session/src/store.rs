use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::state::SessionState;

/// Process-wide session registry. State is created lazily on first access
/// with the configured sandbox root; calls within one session serialize on
/// the per-session mutex.
pub struct SessionStore {
    sandbox_root: PathBuf,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new(sandbox_root: PathBuf) -> Self {
        Self {
            sandbox_root,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn sandbox_root(&self) -> &PathBuf {
        &self.sandbox_root
    }

    /// Fetch the state for `session_id`, creating it on first use.
    pub async fn get(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::debug!("creating session '{session_id}'");
                Arc::new(Mutex::new(SessionState::new(self.sandbox_root.clone())))
            })
            .clone()
    }

    /// Drop a session's state. Shell teardown is the owner's concern.
    pub async fn remove(&self, session_id: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.lock().await.remove(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sessions_are_created_lazily_and_shared() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let store = SessionStore::new(root.clone());

        let a = store.get("alpha").await;
        a.lock().await.lock_cwd();

        let again = store.get("alpha").await;
        assert_eq!(again.lock().await.phase(), Phase::Edit);

        let other = store.get("beta").await;
        assert_eq!(other.lock().await.phase(), Phase::Discovery);
    }
}
