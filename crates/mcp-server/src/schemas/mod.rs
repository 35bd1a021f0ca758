//! Request schemas for the tool catalog. Field docs double as the JSON
//! schema descriptions MCP clients see.

mod bash;
mod code_search;
mod file_editor;
mod git_diff;
mod json_editor;
mod navigator;
mod sequential_thinking;
mod task_done;

pub use bash::BashRequest;
pub use code_search::CodeSearchRequest;
pub use file_editor::FileEditorRequest;
pub use git_diff::GitDiffRequest;
pub use json_editor::JsonEditorRequest;
pub use navigator::NavigatorRequest;
pub use sequential_thinking::SequentialThinkingRequest;
pub use task_done::TaskDoneRequest;

pub(crate) const DEFAULT_SESSION: &str = "default";

pub(crate) fn session_id(raw: &Option<String>) -> &str {
    raw.as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_SESSION)
}
