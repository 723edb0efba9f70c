use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoryStatus {
    Backlog,
    Sprint,
    InProgress,
    Review,
    Done,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryTask {
    pub id: String,
    pub description: String,
    pub done: bool,
}

/// Invariants: if `sprint_id` is set, that sprint's `story_ids` must contain
/// this story (I1); `dependencies` across all stories in a project must form
/// a DAG (enforced by the orchestrator at `add_story`/`prioritize` time, the
/// same way `orch-store`'s scheduler-adjacent code detects task-graph cycles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub description: String,
    pub epic_id: Option<String>,
    pub sprint_id: Option<String>,
    pub status: StoryStatus,
    /// 1 (highest) .. 5 (lowest)
    pub priority: u8,
    pub acceptance_criteria: Vec<String>,
    pub tasks: Vec<StoryTask>,
    pub dependencies: Vec<String>,
    pub tdd_cycle_id: Option<String>,
    pub test_status: String,
    pub test_files: Vec<String>,
    pub ci_status: String,
    pub test_coverage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub fn new(id: String, title: String, description: String, priority: u8) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            description,
            epic_id: None,
            sprint_id: None,
            status: StoryStatus::Backlog,
            priority: priority.clamp(1, 5),
            acceptance_criteria: Vec::new(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
            tdd_cycle_id: None,
            test_status: "not_run".to_string(),
            test_files: Vec::new(),
            ci_status: "unknown".to_string(),
            test_coverage: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}
