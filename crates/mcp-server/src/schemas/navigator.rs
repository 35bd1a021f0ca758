use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NavigatorRequest {
    /// The command to run.
    #[schemars(description = "One of: cd, pwd, ls, read, lock_cwd")]
    pub subcommand: String,

    /// Relative or absolute path for the command.
    #[schemars(description = "Relative or absolute path for the command")]
    pub path: Option<String>,

    /// Line range for `read`, 1-based; `[start, -1]` reads to EOF.
    #[schemars(description = "Line range for `read`, e.g. [11, 20]; [start, -1] reads to EOF")]
    pub view_range: Option<Vec<i64>>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
