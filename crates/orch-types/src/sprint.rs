use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `PAUSED` is deliberately absent: a paused sprint is represented by the
/// Workflow FSM's `SPRINT_PAUSED` state, not by a distinct Sprint status —
/// the sprint entity itself stays `ACTIVE` while the workflow is paused
/// around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TddMetrics {
    pub cycles_started: u32,
    pub cycles_completed: u32,
    pub test_runs: u32,
    pub refactors: u32,
    pub commits: u32,
    pub average_coverage: f64,
}

/// Invariant (I2): at most one Sprint per project may have status `Active`.
/// Enforced by the orchestrator at `plan_sprint`/`start_sprint` time, not by
/// this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub goal: String,
    pub status: SprintStatus,
    pub story_ids: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub retrospective: Option<String>,
    pub active_tdd_cycle_ids: Vec<String>,
    pub tdd_metrics: TddMetrics,
}

impl Sprint {
    pub fn new(id: String, goal: String, story_ids: Vec<String>) -> Self {
        Self {
            id,
            goal,
            status: SprintStatus::Planned,
            story_ids,
            start_date: None,
            end_date: None,
            retrospective: None,
            active_tdd_cycle_ids: Vec::new(),
            tdd_metrics: TddMetrics::default(),
        }
    }
}
