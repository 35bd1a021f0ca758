//! Code Knowledge Graph for the Workbench MCP server.
//!
//! A per-project persistent index of function, class, and method
//! definitions, stored in SQLite and kept in sync with the filesystem by
//! content hashing: every indexed file has exactly one hash row, and its
//! definition rows always reflect the content version that hash was computed
//! from. Re-indexing a file is a single atomic transaction.
//!
//! Extraction is syntactic: tree-sitter concrete syntax trees, definitions
//! only. No call graph, no types.

mod error;
mod extract;
mod language;
mod records;
mod registry;
mod scanner;
mod store;

pub use error::{CkgError, Result};
pub use extract::extract_definitions;
pub use language::Language;
pub use records::{ClassRecord, Definition, FunctionRecord};
pub use registry::{cleanup_stale_databases, CkgRegistry};
pub use scanner::{is_indexable, scan_indexable_files};
pub use store::{database_path_for_root, file_md5, CkgStore, SyncStats};
