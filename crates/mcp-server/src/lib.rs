//! Workbench MCP server.
//!
//! Exposes a fixed catalog of software-engineering tools to MCP clients:
//!
//! - `navigator` - cd/pwd/ls/read plus `lock_cwd`, the discovery→edit gate
//! - `bash` - persistent shell in the locked cwd
//! - `file_editor` - view/create/replace/insert with snippet feedback
//! - `json_editor` - JSONPath view/set/add/remove
//! - `code_search` - function/class/method lookup in the code index
//! - `git_diff` - repository diff, optional base commit
//! - `sequential_thinking` - append-only reasoning scratchpad
//! - `task_done` - completion signal
//!
//! Every tool call is answered with a `{success, content, error_code}`
//! envelope; write-capable tools are denied until the session locks its cwd.

pub mod config;
pub mod envelope;
pub mod git;
pub mod schemas;
pub mod service;
