use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Epic, Sprint, Story};

/// How strictly the command pipeline gates state-changing commands behind
/// human approval. See the Command Pipeline's stage-4 mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrchestrationMode {
    Blocking,
    Partial,
    Autonomous,
    Collaborative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Weight used by the Supervisor's `priority_based` allocation strategy.
    pub fn allocation_weight(self) -> f64 {
        match self {
            Priority::Critical => 2.0,
            Priority::High => 1.5,
            Priority::Normal => 1.0,
            Priority::Low => 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_parallel_agents: u32,
    pub max_memory_mb: u32,
    pub cpu_priority_weight: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_parallel_agents: 3,
            max_memory_mb: 2048,
            cpu_priority_weight: 1.0,
        }
    }
}

/// Identity and policy for a single managed project. Does not hold the
/// project's live domain aggregate (epics/stories/sprints); that lives in the
/// orchestrator's in-memory state, loaded from and flushed to the project
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    pub mode: OrchestrationMode,
    pub priority: Priority,
    pub resource_limits: ResourceLimits,
}

/// A read-only, computed-on-read snapshot of a project's current counts.
/// Never persisted; rebuilt from the in-memory aggregate on each `get_status`
/// call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSummary {
    pub epics_active: usize,
    pub stories_total: usize,
    pub stories_done: usize,
    pub active_sprint_id: Option<String>,
    pub active_tdd_cycle_ids: Vec<String>,
}

/// Project-level TDD policy, persisted alongside the backlog rather than
/// per-sprint: a refactor that drops coverage below this threshold is
/// rejected by the TDD FSM (`REFACTOR -> COMMIT`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTddSettings {
    pub coverage_threshold: f64,
    pub require_test_file_per_task: bool,
}

impl Default for ProjectTddSettings {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.8,
            require_test_file_per_task: true,
        }
    }
}

/// The full contents of `backlog.json`: every Epic, Story, and Sprint for a
/// project, plus its TDD settings. This is the unit `save_project_data`
/// writes atomically and `load_project_data` reads back.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectAggregate {
    pub epics: Vec<Epic>,
    pub stories: Vec<Story>,
    pub sprints: Vec<Sprint>,
    pub tdd_settings: ProjectTddSettings,
}

impl ProjectAggregate {
    pub fn active_sprint(&self) -> Option<&Sprint> {
        self.sprints
            .iter()
            .find(|s| s.status == crate::SprintStatus::Active)
    }

    pub fn run_summary(&self) -> RunSummary {
        RunSummary {
            epics_active: self
                .epics
                .iter()
                .filter(|e| e.status == crate::EpicStatus::Active)
                .count(),
            stories_total: self.stories.len(),
            stories_done: self
                .stories
                .iter()
                .filter(|s| s.status == crate::StoryStatus::Done)
                .count(),
            active_sprint_id: self.active_sprint().map(|s| s.id.clone()),
            active_tdd_cycle_ids: self
                .stories
                .iter()
                .filter_map(|s| s.tdd_cycle_id.clone())
                .collect(),
        }
    }
}

/// `status.json`'s shape: the orchestrator's latest self-reported status,
/// read by the Supervisor (for aggregated metrics) and by `orchestratord
/// status` when no control socket is available, without either needing to
/// parse the full backlog aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatusRecord {
    pub workflow_state: String,
    pub active_tdd_cycle_ids: Vec<String>,
    pub run_summary: RunSummary,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// `check_storage_health()`'s report shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealthReport {
    pub directory_exists: bool,
    pub writable: bool,
    pub json_valid: HashMap<String, bool>,
    pub disk_usage_bytes: u64,
    pub backups_count: u64,
    pub last_checked: chrono::DateTime<chrono::Utc>,
}
