use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CodeSearchRequest {
    /// What to search for.
    #[schemars(description = "One of: search_function, search_class, search_class_method")]
    pub command: String,

    /// Project directory to search (the index root).
    #[schemars(description = "Project directory whose index should be searched")]
    pub path: String,

    /// Exact name of the definition.
    #[schemars(description = "Exact identifier to look up (case-sensitive)")]
    pub identifier: String,

    /// Include definition bodies in the results (default true).
    #[schemars(description = "Include the definition body of each hit, truncated (default true)")]
    pub print_body: Option<bool>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
