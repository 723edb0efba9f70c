use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EpicStatus {
    Active,
    Completed,
    Archived,
}

/// Invariant: `story_ids` must all resolve to stories whose `epic_id` equals
/// this epic's `id` (bidirectional consistency, enforced by the orchestrator
/// on every mutation, not by this type itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: EpicStatus,
    pub priority: Priority,
    pub story_ids: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub tdd_requirements: Vec<String>,
    pub tdd_constraints: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Epic {
    pub fn new(id: String, title: String, description: String, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            description,
            status: EpicStatus::Active,
            priority,
            story_ids: Vec::new(),
            acceptance_criteria: Vec::new(),
            tdd_requirements: Vec::new(),
            tdd_constraints: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
