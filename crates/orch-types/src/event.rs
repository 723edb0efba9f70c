use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the Broadcaster fans out. `kind` is carried via serde's tag so
/// subscribers that only care about a subset can match on the tag without
/// deserializing the whole payload first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    WorkflowTransition {
        project: String,
        from: String,
        to: String,
        command: String,
        requester: String,
        ts: DateTime<Utc>,
    },
    TddTransition {
        project: String,
        story: String,
        cycle: String,
        from: String,
        to: String,
        ts: DateTime<Utc>,
    },
    TaskResult {
        project: String,
        task: String,
        agent: String,
        success: bool,
        duration_s: f64,
    },
    ApprovalPending {
        project: String,
        approval_id: String,
        summary: String,
        ts: DateTime<Utc>,
    },
    ApprovalResolved {
        project: String,
        approval_id: String,
        resolution: String,
        ts: DateTime<Utc>,
    },
    ProjectError {
        project: String,
        restart_count: u32,
        ts: DateTime<Utc>,
    },
    StorageDegraded {
        project: String,
        reason: String,
        ts: DateTime<Utc>,
    },
}

impl OrchestratorEvent {
    pub fn project(&self) -> &str {
        match self {
            OrchestratorEvent::WorkflowTransition { project, .. }
            | OrchestratorEvent::TddTransition { project, .. }
            | OrchestratorEvent::TaskResult { project, .. }
            | OrchestratorEvent::ApprovalPending { project, .. }
            | OrchestratorEvent::ApprovalResolved { project, .. }
            | OrchestratorEvent::ProjectError { project, .. }
            | OrchestratorEvent::StorageDegraded { project, .. } => project,
        }
    }
}
