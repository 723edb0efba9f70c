use orch_fsm::WorkflowState;
use orch_types::OrchestrationMode;

/// Verbs that are pure reads (or, for `/approve`, a resolution that cannot
/// itself require approval without an infinite regress). Never gated,
/// regardless of orchestration mode.
const QUERY_VERBS: &[&str] = &[
    "state",
    "sprint_status",
    "tdd_status",
    "tdd_overview",
    "backlog_view",
    "project_status",
    "approve",
];

/// PARTIAL mode's "destructive or cancellation" set.
const PARTIAL_GATED: &[&str] = &["tdd_abort", "sprint_pause", "request_changes", "skip_task", "backlog_remove"];

/// Whether `verb_key` must be held behind an Approval before it runs, given
/// the project's orchestration mode and its Workflow FSM's current state.
pub fn requires_approval(mode: OrchestrationMode, state: WorkflowState, verb_key: &str) -> bool {
    if QUERY_VERBS.contains(&verb_key) {
        return false;
    }
    match mode {
        OrchestrationMode::Autonomous => false,
        OrchestrationMode::Blocking => true,
        OrchestrationMode::Partial => PARTIAL_GATED.contains(&verb_key),
        OrchestrationMode::Collaborative => {
            matches!(verb_key, "request_changes" | "feedback") && state == WorkflowState::SprintReview
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_verbs_are_never_gated_even_in_blocking_mode() {
        for verb in QUERY_VERBS {
            assert!(!requires_approval(OrchestrationMode::Blocking, WorkflowState::Idle, verb));
        }
    }

    #[test]
    fn blocking_mode_gates_every_non_query_verb() {
        assert!(requires_approval(OrchestrationMode::Blocking, WorkflowState::Idle, "epic"));
        assert!(requires_approval(OrchestrationMode::Blocking, WorkflowState::Idle, "tdd_design"));
    }

    #[test]
    fn autonomous_mode_never_gates_anything() {
        assert!(!requires_approval(OrchestrationMode::Autonomous, WorkflowState::Idle, "tdd_abort"));
    }

    #[test]
    fn partial_mode_only_gates_the_destructive_set() {
        assert!(requires_approval(OrchestrationMode::Partial, WorkflowState::Idle, "backlog_remove"));
        assert!(!requires_approval(OrchestrationMode::Partial, WorkflowState::Idle, "epic"));
    }

    #[test]
    fn collaborative_mode_only_gates_the_sprint_review_exit() {
        assert!(requires_approval(
            OrchestrationMode::Collaborative,
            WorkflowState::SprintReview,
            "feedback"
        ));
        assert!(!requires_approval(
            OrchestrationMode::Collaborative,
            WorkflowState::SprintActive,
            "feedback"
        ));
        assert!(!requires_approval(
            OrchestrationMode::Collaborative,
            WorkflowState::SprintReview,
            "epic"
        ));
    }
}
