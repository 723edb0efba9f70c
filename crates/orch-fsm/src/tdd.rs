use orch_types::{TddCycle, TddState, TddTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TddCommand {
    Design,
    WriteTest,
    Implement,
    Refactor,
    Commit,
}

impl TddCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            TddCommand::Design => "design",
            TddCommand::WriteTest => "write_test",
            TddCommand::Implement => "implement",
            TddCommand::Refactor => "refactor",
            TddCommand::Commit => "commit",
        }
    }

    fn target_state(self) -> TddState {
        match self {
            TddCommand::Design => TddState::Design,
            TddCommand::WriteTest => TddState::TestRed,
            TddCommand::Implement => TddState::CodeGreen,
            TddCommand::Refactor => TddState::Refactor,
            TddCommand::Commit => TddState::Commit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TddCommandResult {
    pub success: bool,
    pub new_state: Option<TddState>,
    pub error_message: Option<String>,
    pub hint: Option<String>,
}

impl TddCommandResult {
    fn ok(state: TddState) -> Self {
        Self {
            success: true,
            new_state: Some(state),
            error_message: None,
            hint: None,
        }
    }

    fn rejected(error_message: String, hint: String) -> Self {
        Self {
            success: false,
            new_state: None,
            error_message: Some(error_message),
            hint: Some(hint),
        }
    }
}

/// `is_base_edge` returns whether `(from, to)` is a structurally valid edge
/// in the DAG, ignoring preconditions; `validate_transition` layers the
/// preconditions on top using the task's reported test/coverage facts.
fn is_base_edge(from: TddState, to: TddState) -> bool {
    matches!(
        (from, to),
        (TddState::Design, TddState::TestRed)
            | (TddState::TestRed, TddState::CodeGreen)
            | (TddState::CodeGreen, TddState::Refactor)
            | (TddState::CodeGreen, TddState::Commit)
            | (TddState::Refactor, TddState::Commit)
            | (TddState::Refactor, TddState::TestRed)
            | (TddState::Commit, TddState::Design)
    )
}

/// Validates a command against a task's current state and its recorded
/// test/coverage facts. Does not mutate; `transition` commits on success.
pub fn validate_transition(
    task: &TddTask,
    command: TddCommand,
    coverage_threshold: f64,
) -> TddCommandResult {
    let from = task.current_state;
    let to = command.target_state();

    if !is_base_edge(from, to) {
        return TddCommandResult::rejected(
            format!("`{}` is not valid from {:?}", command.as_str(), from),
            hint_for(from, command),
        );
    }

    match (from, to) {
        (TddState::TestRed, TddState::CodeGreen) => {
            if !task.has_failing_tests() {
                return TddCommandResult::rejected(
                    "no failing tests recorded yet".to_string(),
                    "Write and run a failing test before moving to CODE_GREEN".to_string(),
                );
            }
            if task.committed_test_file_count() == 0 {
                return TddCommandResult::rejected(
                    "no committed test file for this task".to_string(),
                    "Commit the test file before implementing against it".to_string(),
                );
            }
        }
        (TddState::CodeGreen, TddState::Commit) | (TddState::Refactor, TddState::Commit) => {
            if !task.has_passing_tests() {
                return TddCommandResult::rejected(
                    "tests are not all passing".to_string(),
                    "Get the test suite green before committing".to_string(),
                );
            }
            if from == TddState::Refactor && task.coverage < coverage_threshold {
                return TddCommandResult::rejected(
                    format!(
                        "refactor reduced coverage to {:.1}%, below the {:.1}% threshold",
                        task.coverage * 100.0,
                        coverage_threshold * 100.0
                    ),
                    "Restore coverage before committing the refactor".to_string(),
                );
            }
        }
        _ => {}
    }

    TddCommandResult::ok(to)
}

fn hint_for(from: TddState, command: TddCommand) -> String {
    match (from, command) {
        (TddState::Design, _) => "From DESIGN, the only valid move is write_test".to_string(),
        (TddState::TestRed, TddCommand::Refactor) | (TddState::TestRed, TddCommand::Commit) => {
            "Implement against the failing test (CODE_GREEN) before refactoring or committing"
                .to_string()
        }
        (TddState::Commit, _) => {
            "A completed task only accepts design (to start the next task)".to_string()
        }
        _ => format!("`{}` is not valid here", command.as_str()),
    }
}

/// Commits `command` against `task` if `validate_transition` accepts it,
/// advancing its `current_state` and bumping the cycle's counters.
pub fn apply_transition(
    cycle: &mut TddCycle,
    task_id: &str,
    command: TddCommand,
    coverage_threshold: f64,
) -> TddCommandResult {
    let Some(task) = cycle.tasks.iter_mut().find(|t| t.id == task_id) else {
        return TddCommandResult::rejected(
            format!("task {task_id} not found in cycle"),
            "Check the task id".to_string(),
        );
    };

    let result = validate_transition(task, command, coverage_threshold);
    if let Some(new_state) = result.new_state {
        task.current_state = new_state;
        task.updated_at = chrono::Utc::now();
        match command {
            TddCommand::WriteTest => cycle.counters.test_runs += 1,
            TddCommand::Refactor => cycle.counters.refactors += 1,
            TddCommand::Commit => {
                cycle.counters.commits += 1;
                task.complete = true;
            }
            _ => {}
        }
        cycle.current_state = new_state;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::{TestResult, TestResultStatus};

    fn task_in(state: TddState) -> TddTask {
        let mut task = TddTask::new("t-1".to_string(), "c-1".to_string(), "do the thing".to_string());
        task.current_state = state;
        task
    }

    #[test]
    fn design_to_test_red_always_valid() {
        let task = task_in(TddState::Design);
        let result = validate_transition(&task, TddCommand::WriteTest, 0.8);
        assert!(result.success);
        assert_eq!(result.new_state, Some(TddState::TestRed));
    }

    #[test]
    fn test_red_to_code_green_requires_failing_test_and_committed_file() {
        let task = task_in(TddState::TestRed);
        let result = validate_transition(&task, TddCommand::Implement, 0.8);
        assert!(!result.success);
    }

    #[test]
    fn test_red_to_code_green_succeeds_once_preconditions_met() {
        let mut task = task_in(TddState::TestRed);
        task.test_files.push("tests/test_thing.py".to_string());
        task.test_results.push(TestResult {
            id: "r-1".to_string(),
            test_file: "tests/test_thing.py".to_string(),
            test_name: "test_thing".to_string(),
            status: TestResultStatus::Red,
            output: String::new(),
            error_message: None,
            execution_time_s: 0.1,
            timestamp: chrono::Utc::now(),
        });
        let result = validate_transition(&task, TddCommand::Implement, 0.8);
        assert!(result.success);
    }

    #[test]
    fn refactor_to_commit_blocked_by_coverage_regression() {
        let mut task = task_in(TddState::Refactor);
        task.coverage = 0.5;
        task.test_results.push(TestResult {
            id: "r-1".to_string(),
            test_file: "tests/test_thing.py".to_string(),
            test_name: "test_thing".to_string(),
            status: TestResultStatus::Green,
            output: String::new(),
            error_message: None,
            execution_time_s: 0.1,
            timestamp: chrono::Utc::now(),
        });
        let result = validate_transition(&task, TddCommand::Commit, 0.8);
        assert!(!result.success);
    }

    #[test]
    fn refactor_can_loop_back_to_test_red() {
        let task = task_in(TddState::Refactor);
        let result = validate_transition(&task, TddCommand::WriteTest, 0.8);
        assert!(result.success);
        assert_eq!(result.new_state, Some(TddState::TestRed));
    }

    #[test]
    fn commit_to_design_starts_next_task() {
        let task = task_in(TddState::Commit);
        let result = validate_transition(&task, TddCommand::Design, 0.8);
        assert!(result.success);
    }

    #[test]
    fn apply_transition_updates_cycle_counters_and_current_state() {
        let mut cycle = TddCycle::new("c-1".to_string(), "story-1".to_string());
        let task = TddTask::new("t-1".to_string(), "c-1".to_string(), "design the thing".to_string());
        cycle.tasks.push(task);
        cycle.current_task_id = Some("t-1".to_string());

        let result = apply_transition(&mut cycle, "t-1", TddCommand::WriteTest, 0.8);
        assert!(result.success);
        assert_eq!(cycle.current_state, TddState::TestRed);
        assert_eq!(cycle.counters.test_runs, 1);
    }

    #[test]
    fn apply_transition_unknown_task_is_rejected() {
        let mut cycle = TddCycle::new("c-1".to_string(), "story-1".to_string());
        let result = apply_transition(&mut cycle, "missing", TddCommand::Design, 0.8);
        assert!(!result.success);
    }
}
