use std::collections::HashMap;

use chrono::{DateTime, Utc};
use orch_types::AgentType;
use serde::{Deserialize, Serialize};

/// A single agent invocation dispatched by the orchestrator. At most one
/// `DispatchTask` is ever in-flight per TDD cycle at a time (§4.5's
/// at-most-one-per-story rule); the orchestrator enforces that by keying its
/// in-flight map on `story_id`, not by anything in this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTask {
    pub id: String,
    pub story_id: String,
    pub cycle_id: String,
    pub tdd_task_id: String,
    pub agent_type: AgentType,
    pub command: String,
    pub context: serde_json::Value,
    pub state: DispatchTaskState,
    pub attempt: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
}

impl DispatchTask {
    pub fn new(
        story_id: impl Into<String>,
        cycle_id: impl Into<String>,
        tdd_task_id: impl Into<String>,
        agent_type: AgentType,
        command: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            story_id: story_id.into(),
            cycle_id: cycle_id.into(),
            tdd_task_id: tdd_task_id.into(),
            agent_type,
            command: command.into(),
            context,
            state: DispatchTaskState::Pending,
            attempt: 0,
            max_retries: 3,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchTaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// What an agent invocation reports back. Agents are black boxes invoked
/// through a restricted tool surface; the orchestrator never inspects how an
/// outcome was produced, only this structured result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub messages: Vec<String>,
    /// filename -> content, handed back to the Command Pipeline or persisted
    /// via the Project Store by the caller.
    pub artifacts: HashMap<String, String>,
    pub error: Option<String>,
    pub duration_s: f64,
}

impl TaskOutcome {
    pub fn ok(messages: Vec<String>, duration_s: f64) -> Self {
        Self {
            success: true,
            messages,
            artifacts: HashMap::new(),
            error: None,
            duration_s,
        }
    }

    pub fn failed(error: impl Into<String>, duration_s: f64) -> Self {
        Self {
            success: false,
            messages: Vec::new(),
            artifacts: HashMap::new(),
            error: Some(error.into()),
            duration_s,
        }
    }
}
