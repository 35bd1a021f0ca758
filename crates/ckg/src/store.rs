use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use md5::{Digest, Md5};
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::extract::extract_definitions;
use crate::language::Language;
use crate::records::{ClassRecord, Definition, FunctionRecord};
use crate::scanner::{is_indexable, scan_indexable_files};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS functions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        body TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        parent_function TEXT,
        parent_class TEXT
    )",
    "CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        body TEXT NOT NULL,
        fields TEXT,
        methods TEXT,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS file_hashes (
        file_path TEXT PRIMARY KEY,
        hash TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_functions_file_path ON functions(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_classes_file_path ON classes(file_path)",
];

/// MD5 hex digest of a byte slice.
fn content_md5(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    let mut out = String::with_capacity(32);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// MD5 hex digest of a file's current content.
pub fn file_md5(path: &Path) -> Result<String> {
    Ok(content_md5(&std::fs::read(path)?))
}

/// Stable database location for a project root: the root path is hashed so
/// every project gets its own persistent file.
pub fn database_path_for_root(storage_dir: &Path, root: &Path) -> PathBuf {
    let hash = content_md5(root.to_string_lossy().as_bytes());
    storage_dir.join("ckg").join(format!("ckg_{hash}.db"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    pub reindexed: usize,
    pub removed: usize,
}

/// The definitions index for one project root.
///
/// The connection sits behind a `std::sync::Mutex` (rusqlite connections are
/// not `Sync`); WAL journaling lets concurrent sessions against the same
/// root serialize at the database layer. Keep critical sections short.
pub struct CkgStore {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl CkgStore {
    /// Open (creating if needed) the index for `root` and bring it in sync
    /// with the filesystem.
    pub fn open(storage_dir: &Path, root: &Path) -> Result<Self> {
        let db_path = database_path_for_root(storage_dir, root);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        let store = Self::init(conn, root)?;
        let stats = store.sync_codebase()?;
        log::debug!(
            "opened CKG for {} ({} reindexed, {} removed)",
            root.display(),
            stats.reindexed,
            stats.removed
        );
        Ok(store)
    }

    /// In-memory variant for tests; synced on open like the persistent one.
    pub fn open_in_memory(root: &Path) -> Result<Self> {
        let store = Self::init(Connection::open_in_memory()?, root)?;
        store.sync_codebase()?;
        Ok(store)
    }

    fn init(conn: Connection, root: &Path) -> Result<Self> {
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        for sql in SCHEMA {
            conn.execute(sql, [])?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Compare the filesystem against the stored hashes: reindex new or
    /// changed files, drop rows for files that no longer exist.
    pub fn sync_codebase(&self) -> Result<SyncStats> {
        let disk_files = scan_indexable_files(&self.root);
        let stored: HashMap<String, String> = {
            let conn = self.conn();
            let mut stmt = conn.prepare("SELECT file_path, hash FROM file_hashes")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut stats = SyncStats::default();
        let mut on_disk: HashSet<String> = HashSet::new();
        for file in &disk_files {
            let path_str = file.to_string_lossy().to_string();
            on_disk.insert(path_str.clone());
            let hash = match file_md5(file) {
                Ok(hash) => hash,
                Err(err) => {
                    log::warn!("skipping {path_str}: {err}");
                    continue;
                }
            };
            if stored.get(&path_str) != Some(&hash) {
                log::debug!("re-indexing changed file: {path_str}");
                self.on_file_changed(file)?;
                stats.reindexed += 1;
            }
        }

        for path_str in stored.keys() {
            if !on_disk.contains(path_str) {
                log::debug!("removing deleted file from index: {path_str}");
                self.remove_path(path_str)?;
                stats.removed += 1;
            }
        }
        Ok(stats)
    }

    /// Re-index one file as a single transaction: old rows out, fresh rows
    /// in, hash upserted. On error the transaction rolls back and the
    /// previous version's rows and hash stay consistent. A file that fails
    /// to parse keeps its hash current but contributes no rows.
    pub fn on_file_changed(&self, file: &Path) -> Result<()> {
        if !is_indexable(&self.root, file) {
            return Ok(());
        }
        let Some(language) = Language::from_path(file) else {
            return Ok(());
        };
        let path_str = file.to_string_lossy().to_string();
        let bytes = std::fs::read(file)?;
        let hash = content_md5(&bytes);
        let source = String::from_utf8_lossy(&bytes);
        let definitions = match extract_definitions(language, &source, &path_str) {
            Ok(definitions) => definitions,
            Err(err) => {
                log::warn!("failed to parse {path_str}: {err}");
                Vec::new()
            }
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM functions WHERE file_path = ?1", params![path_str])?;
        tx.execute("DELETE FROM classes WHERE file_path = ?1", params![path_str])?;
        for definition in &definitions {
            match definition {
                Definition::Function(func) => {
                    tx.execute(
                        "INSERT INTO functions (name, file_path, body, start_line, end_line, parent_function, parent_class)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            func.name,
                            func.file_path,
                            func.body,
                            func.start_line as i64,
                            func.end_line as i64,
                            func.parent_function,
                            func.parent_class,
                        ],
                    )?;
                }
                Definition::Class(class) => {
                    tx.execute(
                        "INSERT INTO classes (name, file_path, body, fields, methods, start_line, end_line)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            class.name,
                            class.file_path,
                            class.body,
                            class.fields,
                            class.methods,
                            class.start_line as i64,
                            class.end_line as i64,
                        ],
                    )?;
                }
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO file_hashes (file_path, hash) VALUES (?1, ?2)",
            params![path_str, hash],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop every row belonging to `file`.
    pub fn remove_file(&self, file: &Path) -> Result<()> {
        self.remove_path(&file.to_string_lossy())
    }

    fn remove_path(&self, path_str: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM functions WHERE file_path = ?1", params![path_str])?;
        tx.execute("DELETE FROM classes WHERE file_path = ?1", params![path_str])?;
        tx.execute("DELETE FROM file_hashes WHERE file_path = ?1", params![path_str])?;
        tx.commit()?;
        Ok(())
    }

    /// The stored hash for a file, if it is indexed.
    pub fn stored_hash(&self, file: &Path) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT hash FROM file_hashes WHERE file_path = ?1")?;
        let mut rows = stmt.query_map(params![file.to_string_lossy()], |row| row.get(0))?;
        match rows.next() {
            Some(hash) => Ok(Some(hash?)),
            None => Ok(None),
        }
    }

    /// Top-level (and nested) functions with this exact name.
    pub fn search_function(&self, identifier: &str) -> Result<Vec<FunctionRecord>> {
        self.query_functions(identifier, false)
    }

    /// Class methods with this exact name; `parent_class` is always set.
    pub fn search_class_method(&self, identifier: &str) -> Result<Vec<FunctionRecord>> {
        self.query_functions(identifier, true)
    }

    fn query_functions(&self, identifier: &str, methods: bool) -> Result<Vec<FunctionRecord>> {
        let sql = if methods {
            "SELECT name, file_path, body, start_line, end_line, parent_function, parent_class
             FROM functions WHERE name = ?1 AND parent_class IS NOT NULL"
        } else {
            "SELECT name, file_path, body, start_line, end_line, parent_function, parent_class
             FROM functions WHERE name = ?1 AND parent_class IS NULL"
        };
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![identifier], |row| {
            Ok(FunctionRecord {
                name: row.get(0)?,
                file_path: row.get(1)?,
                body: row.get(2)?,
                start_line: row.get::<_, i64>(3)? as usize,
                end_line: row.get::<_, i64>(4)? as usize,
                parent_function: row.get(5)?,
                parent_class: row.get(6)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    /// Classes with this exact name.
    pub fn search_class(&self, identifier: &str) -> Result<Vec<ClassRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, file_path, body, fields, methods, start_line, end_line
             FROM classes WHERE name = ?1",
        )?;
        let rows = stmt.query_map(params![identifier], |row| {
            Ok(ClassRecord {
                name: row.get(0)?,
                file_path: row.get(1)?,
                body: row.get(2)?,
                fields: row.get(3)?,
                methods: row.get(4)?,
                start_line: row.get::<_, i64>(5)? as usize,
                end_line: row.get::<_, i64>(6)? as usize,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
    }

    /// All rows for one file, used by tests and the sync invariant checks.
    pub fn definitions_for_file(&self, file: &Path) -> Result<(usize, usize)> {
        let path_str = file.to_string_lossy().to_string();
        let conn = self.conn();
        let functions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM functions WHERE file_path = ?1",
            params![path_str],
            |row| row.get(0),
        )?;
        let classes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM classes WHERE file_path = ?1",
            params![path_str],
            |row| row.get(0),
        )?;
        Ok((functions as usize, classes as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn project() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::write(
            root.join("a.py"),
            "def f(): return 1\n\nclass A:\n    def m(self):\n        pass\n",
        )
        .unwrap();
        std::fs::write(root.join("util.js"), "function go() { return 1; }\n").unwrap();
        (tmp, root)
    }

    #[test]
    fn open_syncs_and_queries_resolve() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();

        let functions = store.search_function("f").unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].start_line, 1);
        assert_eq!(functions[0].parent_class, None);

        let methods = store.search_class_method("m").unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].parent_class.as_deref(), Some("A"));

        let classes = store.search_class("A").unwrap();
        assert_eq!(classes.len(), 1);

        // Top-level function search does not return methods and vice versa.
        assert!(store.search_function("m").unwrap().is_empty());
        assert!(store.search_class_method("f").unwrap().is_empty());

        let js = store.search_function("go").unwrap();
        assert_eq!(js.len(), 1);
    }

    #[test]
    fn hash_matches_file_content() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();
        let file = root.join("a.py");
        let stored = store.stored_hash(&file).unwrap().unwrap();
        assert_eq!(stored, file_md5(&file).unwrap());
    }

    #[test]
    fn on_file_changed_is_idempotent() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();
        let file = root.join("a.py");

        let before = store.definitions_for_file(&file).unwrap();
        let hash_before = store.stored_hash(&file).unwrap();
        store.on_file_changed(&file).unwrap();
        store.on_file_changed(&file).unwrap();
        assert_eq!(store.definitions_for_file(&file).unwrap(), before);
        assert_eq!(store.stored_hash(&file).unwrap(), hash_before);
    }

    #[test]
    fn editing_a_file_replaces_its_rows() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();
        let file = root.join("a.py");

        std::fs::write(&file, "def g(): return 2\n").unwrap();
        store.on_file_changed(&file).unwrap();

        assert!(store.search_function("f").unwrap().is_empty());
        assert!(store.search_class("A").unwrap().is_empty());
        let g = store.search_function("g").unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(
            store.stored_hash(&file).unwrap().unwrap(),
            file_md5(&file).unwrap()
        );
    }

    #[test]
    fn sync_removes_rows_for_deleted_files() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();
        let file = root.join("util.js");

        std::fs::remove_file(&file).unwrap();
        let stats = store.sync_codebase().unwrap();
        assert_eq!(stats.removed, 1);
        assert!(store.search_function("go").unwrap().is_empty());
        assert_eq!(store.stored_hash(&file).unwrap(), None);
    }

    #[test]
    fn unparseable_files_keep_their_hash_but_no_rows() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();
        let file = root.join("a.py");

        // Even badly broken sources usually parse with error nodes; either
        // way the hash must land so sync does not loop on the file.
        std::fs::write(&file, "def (((\n").unwrap();
        store.on_file_changed(&file).unwrap();
        assert_eq!(
            store.stored_hash(&file).unwrap().unwrap(),
            file_md5(&file).unwrap()
        );
        assert!(store.search_function("f").unwrap().is_empty());
    }

    #[test]
    fn files_outside_the_root_are_ignored() {
        let (_tmp, root) = project();
        let store = CkgStore::open_in_memory(&root).unwrap();
        let elsewhere = tempdir().unwrap();
        let outside = elsewhere.path().join("x.py");
        std::fs::write(&outside, "def q(): pass\n").unwrap();
        store.on_file_changed(&outside).unwrap();
        assert!(store.search_function("q").unwrap().is_empty());
    }

    #[test]
    fn database_path_is_stable_per_root() {
        let storage = Path::new("/tmp/storage");
        let a = database_path_for_root(storage, Path::new("/w/project"));
        let b = database_path_for_root(storage, Path::new("/w/project"));
        let c = database_path_for_root(storage, Path::new("/w/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/tmp/storage/ckg"));
        assert!(a.to_string_lossy().ends_with(".db"));
    }
}
