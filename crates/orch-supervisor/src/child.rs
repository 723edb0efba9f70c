use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised project process, as seen from outside the
/// child's own `orchestrator` binary — the Supervisor never inspects the
/// child's Workflow FSM, only whether the OS process is alive and how it
/// last exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    Starting,
    Running,
    Paused,
    Stopped,
    Crashed,
    Error,
}

impl ChildStatus {
    /// Whether `tick()` should still be polling this child's exit status.
    /// `Stopped` and `Error` are terminal from the Supervisor's point of
    /// view: a stopped child was asked to stop, an errored one exhausted its
    /// restart budget and will not be restarted automatically.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChildStatus::Stopped | ChildStatus::Error)
    }
}

/// Bookkeeping the Supervisor keeps per project, independent of the OS
/// process handle itself so it can be serialized into status snapshots and
/// survive a supervisor restart (the process itself cannot, but the record
/// of why it last died can).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRecord {
    pub project_name: String,
    pub pid: Option<u32>,
    pub status: ChildStatus,
    pub start_time: DateTime<Utc>,
    pub last_poll: DateTime<Utc>,
    pub restart_count: u32,
    pub restart_window_start: DateTime<Utc>,
}

impl ChildRecord {
    pub fn new(project_name: impl Into<String>, pid: u32, now: DateTime<Utc>) -> Self {
        Self {
            project_name: project_name.into(),
            pid: Some(pid),
            status: ChildStatus::Starting,
            start_time: now,
            last_poll: now,
            restart_count: 0,
            restart_window_start: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_and_error_are_terminal() {
        assert!(ChildStatus::Stopped.is_terminal());
        assert!(ChildStatus::Error.is_terminal());
        assert!(!ChildStatus::Running.is_terminal());
        assert!(!ChildStatus::Crashed.is_terminal());
    }
}
