use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::error::Result;
use crate::store::CkgStore;

/// One shared [`CkgStore`] per project root. Handles outlive the sessions
/// that requested them, so a second session against the same root reuses the
/// already-synced index.
pub struct CkgRegistry {
    storage_dir: PathBuf,
    stores: Mutex<HashMap<PathBuf, Arc<CkgStore>>>,
}

impl CkgRegistry {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            storage_dir,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the index for `root`, opening (and syncing) it on first use.
    /// The map lock is held across the open; callers run this off the async
    /// executor.
    pub fn get(&self, root: &Path) -> Result<Arc<CkgStore>> {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = stores.get(root) {
            return Ok(store.clone());
        }
        log::debug!("opening CKG database for {}", root.display());
        let store = Arc::new(CkgStore::open(&self.storage_dir, root)?);
        stores.insert(root.to_path_buf(), store.clone());
        Ok(store)
    }

    /// Every index currently open. Write paths use this to notify the
    /// stores whose root contains a changed file without forcing an open.
    pub fn open_stores(&self) -> Vec<Arc<CkgStore>> {
        self.stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

/// Delete CKG databases that have not been touched within `retention`.
/// Runs at server start; WAL side files go with their database.
pub fn cleanup_stale_databases(storage_dir: &Path, retention: Duration) -> Result<usize> {
    let dir = storage_dir.join("ckg");
    if !dir.is_dir() {
        return Ok(0);
    }
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("db") {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age >= retention {
            log::info!("removing stale CKG database {}", path.display());
            std::fs::remove_file(&path)?;
            for suffix in ["-wal", "-shm"] {
                let side = PathBuf::from(format!("{}{suffix}", path.display()));
                let _ = std::fs::remove_file(side);
            }
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn registry_shares_one_store_per_root() {
        let storage = tempdir().unwrap();
        let project = tempdir().unwrap();
        let root = project.path().canonicalize().unwrap();
        std::fs::write(root.join("a.py"), "def f(): pass\n").unwrap();

        let registry = CkgRegistry::new(storage.path().to_path_buf());
        let first = registry.get(&root).unwrap();
        let second = registry.get(&root).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn cleanup_removes_only_old_databases() {
        let storage = tempdir().unwrap();
        let ckg_dir = storage.path().join("ckg");
        std::fs::create_dir_all(&ckg_dir).unwrap();
        std::fs::write(ckg_dir.join("ckg_old.db"), b"stale").unwrap();
        std::fs::write(ckg_dir.join("ckg_old.db-wal"), b"stale").unwrap();
        std::fs::write(ckg_dir.join("notes.txt"), b"keep").unwrap();

        // Zero retention: everything with a .db extension is stale.
        let removed = cleanup_stale_databases(storage.path(), Duration::ZERO).unwrap();
        assert_eq!(removed, 1);
        assert!(!ckg_dir.join("ckg_old.db").exists());
        assert!(!ckg_dir.join("ckg_old.db-wal").exists());
        assert!(ckg_dir.join("notes.txt").exists());

        // Long retention keeps fresh databases.
        std::fs::write(ckg_dir.join("ckg_new.db"), b"fresh").unwrap();
        let removed = cleanup_stale_databases(storage.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert!(ckg_dir.join("ckg_new.db").exists());
    }
}
