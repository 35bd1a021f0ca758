use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BashRequest {
    /// The bash command to run in the locked cwd.
    #[schemars(description = "The bash command to run in the locked cwd")]
    pub command: Option<String>,

    /// Tear down the current shell and start a fresh one (no command runs).
    #[schemars(description = "Restart the shell session instead of running a command")]
    pub restart: Option<bool>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
