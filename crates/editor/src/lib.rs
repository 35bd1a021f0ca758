//! Precise file editing for the Workbench MCP server.
//!
//! Two engines share one error type and one write-notification seam:
//!
//! - the text engine: view with line numbers, create, uniqueness-checked
//!   string replacement, and line-addressed insertion, each edit answered
//!   with a snippet of the surrounding lines;
//! - the JSON engine: JSONPath-addressed view/set/add/remove over whole
//!   documents, preserving structure and pretty-printing on write.
//!
//! Successful writes notify a [`ChangeObserver`] so the code index can
//! reindex the touched file.

mod error;
mod json;
mod jsonpath;
mod observer;
mod render;
mod text;

pub use error::{EditorError, Result};
pub use json::JsonEditor;
pub use jsonpath::JsonPath;
pub use observer::{ChangeObserver, NullObserver};
pub use render::{clip_text, numbered, CLIPPED_MARKER};
pub use text::{TextEditor, SNIPPET_LINES};
