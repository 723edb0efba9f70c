use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TddState {
    Design,
    TestRed,
    CodeGreen,
    Refactor,
    Commit,
}

impl TddState {
    pub fn as_command_str(self) -> &'static str {
        match self {
            TddState::Design => "design",
            TddState::TestRed => "write_test",
            TddState::CodeGreen => "implement",
            TddState::Refactor => "refactor",
            TddState::Commit => "commit",
        }
    }

    /// The uppercase phase label used by the Agent Capability Registry's
    /// `tdd_phases` tables and in event/status JSON.
    pub fn as_phase_str(self) -> &'static str {
        match self {
            TddState::Design => "DESIGN",
            TddState::TestRed => "TEST_RED",
            TddState::CodeGreen => "CODE_GREEN",
            TddState::Refactor => "REFACTOR",
            TddState::Commit => "COMMIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestFileStatus {
    Draft,
    Committed,
    Passing,
    Integrated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFileCounts {
    pub total: u32,
    pub passing: u32,
    pub failing: u32,
}

/// Lifecycle: DRAFT (authored in TEST_RED) -> COMMITTED (first commit with
/// failing tests) -> PASSING (failing count reaches 0) -> INTEGRATED
/// (promoted to the permanent test tree). Monotone except PASSING ->
/// COMMITTED if tests later regress to failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestFile {
    pub id: String,
    pub file_path: String,
    pub relative_path: String,
    pub story_id: String,
    pub task_id: String,
    pub status: TestFileStatus,
    pub ci_status: String,
    pub counts: TestFileCounts,
    pub coverage: f64,
    pub created_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
    pub integrated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResultStatus {
    NotRun,
    Red,
    Green,
    Error,
}

/// The latest entry per `(test_file, test_name)` defines the pair's current
/// status; callers needing "current status" filter `test_results` down to
/// the most recent timestamp per key rather than this type tracking it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub test_file: String,
    pub test_name: String,
    pub status: TestResultStatus,
    pub output: String,
    pub error_message: Option<String>,
    pub execution_time_s: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TddTaskNotes {
    pub design: Option<String>,
    pub test_red: Option<String>,
    pub code_green: Option<String>,
    pub refactor: Option<String>,
    pub commit: Option<String>,
}

/// Invariant: `test_files` (paths) and the cycle's `test_file_objects` map
/// correspond 1:1; the orchestrator inserts both together or neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TddTask {
    pub id: String,
    pub cycle_id: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub current_state: TddState,
    pub test_files: Vec<String>,
    pub source_files: Vec<String>,
    pub test_results: Vec<TestResult>,
    pub notes: TddTaskNotes,
    pub ci_status: String,
    pub coverage: f64,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TddTask {
    pub fn new(id: String, cycle_id: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            cycle_id,
            description,
            acceptance_criteria: Vec::new(),
            current_state: TddState::Design,
            test_files: Vec::new(),
            source_files: Vec::new(),
            test_results: Vec::new(),
            notes: TddTaskNotes::default(),
            ci_status: "unknown".to_string(),
            coverage: 0.0,
            complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// `TEST_RED -> CODE_GREEN` precondition: the task reports at least one
    /// failing test and at least one committed test file.
    pub fn has_failing_tests(&self) -> bool {
        self.test_results
            .iter()
            .any(|r| r.status == TestResultStatus::Red)
    }

    pub fn committed_test_file_count(&self) -> usize {
        self.test_files.len()
    }

    /// `CODE_GREEN|REFACTOR -> COMMIT` precondition.
    pub fn has_passing_tests(&self) -> bool {
        !self.test_results.is_empty()
            && self
                .test_results
                .iter()
                .all(|r| r.status == TestResultStatus::Green)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TddCounters {
    pub test_runs: u32,
    pub refactors: u32,
    pub commits: u32,
}

/// Invariants (I4): at most one `current_task_id` per cycle; the cycle's
/// `current_state` equals its current task's `current_state`, kept in sync by
/// the TDD FSM on every accepted transition rather than recomputed lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TddCycle {
    pub id: String,
    pub story_id: String,
    pub current_state: TddState,
    pub current_task_id: Option<String>,
    pub tasks: Vec<TddTask>,
    pub counters: TddCounters,
    pub ci_status: String,
    pub overall_coverage: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by the orchestrator on startup when this cycle was found mid-phase
    /// without a clean shutdown marker; cleared once a crash-recovery
    /// approval is resolved.
    pub needs_recovery: bool,
}

impl TddCycle {
    pub fn new(id: String, story_id: String) -> Self {
        Self {
            id,
            story_id,
            current_state: TddState::Design,
            current_task_id: None,
            tasks: Vec::new(),
            counters: TddCounters::default(),
            ci_status: "unknown".to_string(),
            overall_coverage: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            needs_recovery: false,
        }
    }

    pub fn current_task(&self) -> Option<&TddTask> {
        let id = self.current_task_id.as_ref()?;
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn current_task_mut(&mut self) -> Option<&mut TddTask> {
        let id = self.current_task_id.clone()?;
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// A cycle is terminal (complete) once every task is in COMMIT and marked
    /// complete.
    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty()
            && self
                .tasks
                .iter()
                .all(|t| t.complete && t.current_state == TddState::Commit)
    }
}
