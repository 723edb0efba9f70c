use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalResolution {
    Pending,
    Approved,
    Rejected,
    TimedOut,
}

/// A single gated decision raised by the Command Pipeline or the TDD FSM
/// (phase advance, destructive command, elevated tool use). `payload` carries
/// whatever the requester needs rendered back to the human — a diff, a
/// command string, a parsed task list — without the Approval Ledger needing
/// to understand its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: String,
    pub project: String,
    pub summary: String,
    pub payload: Value,
    pub requested_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub resolution: ApprovalResolution,
    pub resolver: Option<String>,
    pub feedback: Option<String>,
}

impl Approval {
    pub fn new(
        id: String,
        project: String,
        summary: String,
        payload: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            project,
            summary,
            payload,
            requested_at: Utc::now(),
            expires_at,
            resolution: ApprovalResolution::Pending,
            resolver: None,
            feedback: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.resolution == ApprovalResolution::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(t) if now >= t) && self.is_pending()
    }
}
