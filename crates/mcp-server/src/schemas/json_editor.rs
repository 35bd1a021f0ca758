use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonEditorRequest {
    /// The operation to perform.
    #[schemars(description = "One of: view, set, add, remove")]
    pub operation: String,

    /// Path to the JSON file, relative to the session cwd.
    #[schemars(description = "Path to the JSON file, relative to the session cwd")]
    pub file_path: String,

    /// JSONPath locating the target, e.g. `$.config.host` or `$.items[0]`.
    #[schemars(
        description = "JSONPath expression (e.g. '$.users[0].name'); required for set/add/remove, optional for view"
    )]
    pub json_path: Option<String>,

    /// Value for `set` and `add`; any JSON.
    #[schemars(description = "The JSON value to set or add")]
    pub value: Option<serde_json::Value>,

    /// Pretty-print the document on write (default true).
    #[schemars(description = "Pretty-print the document when writing (default true)")]
    pub pretty_print: Option<bool>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
