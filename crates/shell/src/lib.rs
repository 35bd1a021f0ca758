//! Persistent shell execution for the Workbench MCP server.
//!
//! One long-lived `bash` child per session. Output framing does not guess at
//! prompts: after each command the engine emits a UUID sentinel on stdout
//! (carrying `$?`) and on stderr, and reads each stream up to its sentinel
//! line. A command that outlives its timeout kills the child; the next call
//! respawns it.

mod error;
mod session;
mod truncate;

pub use error::{Result, ShellError};
pub use session::{CommandOutput, ShellOptions, ShellSession};
pub use truncate::{maybe_truncate, TRUNCATED_MARKER};
