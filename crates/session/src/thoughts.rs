use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// One entry in the thinking scratchpad. Revisions and branches are data;
/// the history itself is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtRecord {
    pub thought: String,
    pub thought_number: u32,
    pub total_thoughts: u32,
    pub next_thought_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_revision: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revises_thought: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_from_thought: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_more_thoughts: Option<bool>,
}

/// What a `sequential_thinking` call reports back.
#[derive(Debug, Clone, Serialize)]
pub struct ThoughtOutcome {
    pub thought_number: u32,
    pub total_thoughts: u32,
    pub next_thought_needed: bool,
    pub branches: Vec<String>,
    pub thought_history_length: usize,
}

#[derive(Debug, Default)]
pub struct ThoughtLog {
    history: Vec<ThoughtRecord>,
    branches: BTreeMap<String, Vec<ThoughtRecord>>,
}

impl ThoughtLog {
    /// Append a thought. `total_thoughts` is raised to `thought_number` when
    /// the caller has outgrown its own estimate.
    pub fn record(&mut self, mut record: ThoughtRecord) -> Result<ThoughtOutcome> {
        if record.thought_number < 1 {
            return Err(SessionError::InvalidThought(
                "thought_number must be at least 1".to_string(),
            ));
        }
        if record.thought_number > record.total_thoughts {
            record.total_thoughts = record.thought_number;
        }

        if let Some(branch_id) = record.branch_id.clone() {
            self.branches
                .entry(branch_id)
                .or_default()
                .push(record.clone());
        }
        let outcome = ThoughtOutcome {
            thought_number: record.thought_number,
            total_thoughts: record.total_thoughts,
            next_thought_needed: record.next_thought_needed,
            branches: self.branches.keys().cloned().collect(),
            thought_history_length: self.history.len() + 1,
        };
        self.history.push(record);
        Ok(outcome)
    }

    pub fn history(&self) -> &[ThoughtRecord] {
        &self.history
    }

    pub fn branch(&self, branch_id: &str) -> Option<&[ThoughtRecord]> {
        self.branches.get(branch_id).map(Vec::as_slice)
    }
}
