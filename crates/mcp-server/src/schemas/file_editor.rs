use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FileEditorRequest {
    /// The operation to perform.
    #[schemars(description = "One of: view, create, replace, insert")]
    pub operation: String,

    /// Path to the file or directory, relative to the session cwd.
    #[schemars(description = "Path to the file or directory, relative to the session cwd")]
    pub path: String,

    /// Content for `create`.
    #[schemars(description = "Full file content, required for `create`")]
    pub file_text: Option<String>,

    /// String to find for `replace`; must occur exactly once.
    #[schemars(
        description = "Exact string to replace; must match one or more consecutive lines verbatim and be unique in the file"
    )]
    pub old_str: Option<String>,

    /// Replacement for `replace` (empty deletes), or the text for `insert`.
    #[schemars(description = "Replacement text for `replace`, or the lines to add for `insert`")]
    pub new_str: Option<String>,

    /// 1-based line `new_str` is inserted after; 0 inserts at the top.
    #[schemars(description = "Line to insert after (1-based; 0 means the top of the file)")]
    pub insert_line: Option<i64>,

    /// Line range for `view` on a file, e.g. `[11, 20]`; `[start, -1]` to EOF.
    #[schemars(description = "Line range for `view`, e.g. [11, 20]; [start, -1] shows to EOF")]
    pub view_range: Option<Vec<i64>>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
