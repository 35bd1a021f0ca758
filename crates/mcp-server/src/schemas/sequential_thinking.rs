use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SequentialThinkingRequest {
    /// The current thinking step.
    #[schemars(description = "The current thinking step")]
    pub thought: String,

    /// Current thought number, starting at 1.
    #[schemars(description = "Current thought number (>= 1)")]
    pub thought_number: u32,

    /// Estimated total thoughts needed; grown automatically when exceeded.
    #[schemars(description = "Estimated total thoughts needed")]
    pub total_thoughts: u32,

    /// Whether another thought is needed after this one.
    #[schemars(description = "Whether another thought step is needed")]
    pub next_thought_needed: bool,

    /// This thought revises an earlier one.
    #[schemars(description = "Whether this revises previous thinking")]
    pub is_revision: Option<bool>,

    /// Which thought number is being reconsidered.
    #[schemars(description = "Which thought is being reconsidered")]
    pub revises_thought: Option<u32>,

    /// Thought number this branch forks from.
    #[schemars(description = "Branching point thought number")]
    pub branch_from_thought: Option<u32>,

    /// Identifier of the branch this thought extends.
    #[schemars(description = "Branch identifier")]
    pub branch_id: Option<String>,

    /// More thoughts are needed than originally estimated.
    #[schemars(description = "If more thoughts are needed")]
    pub needs_more_thoughts: Option<bool>,

    /// Session identifier; omit for the default session.
    #[schemars(description = "Session identifier; omit for the default session")]
    pub session_id: Option<String>,
}
