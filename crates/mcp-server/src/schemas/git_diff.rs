use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GitDiffRequest {
    /// Path to the git repository.
    #[schemars(description = "Path to the git repository, relative to the session cwd")]
    pub path: String,

    /// Diff against `<base_commit>..HEAD` instead of the working tree.
    #[schemars(
        description = "Commit to diff against (producing <base_commit>..HEAD); omit for uncommitted changes"
    )]
    pub base_commit: Option<String>,

    /// Keep hunks that touch test files (default true).
    #[schemars(description = "Include hunks touching test files (default true)")]
    pub include_test_files: Option<bool>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
