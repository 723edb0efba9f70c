use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    Idle,
    BacklogReady,
    SprintPlanned,
    SprintActive,
    SprintPaused,
    SprintReview,
    Blocked,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Idle => "IDLE",
            WorkflowState::BacklogReady => "BACKLOG_READY",
            WorkflowState::SprintPlanned => "SPRINT_PLANNED",
            WorkflowState::SprintActive => "SPRINT_ACTIVE",
            WorkflowState::SprintPaused => "SPRINT_PAUSED",
            WorkflowState::SprintReview => "SPRINT_REVIEW",
            WorkflowState::Blocked => "BLOCKED",
        }
    }

    fn all() -> [WorkflowState; 7] {
        [
            WorkflowState::Idle,
            WorkflowState::BacklogReady,
            WorkflowState::SprintPlanned,
            WorkflowState::SprintActive,
            WorkflowState::SprintPaused,
            WorkflowState::SprintReview,
            WorkflowState::Blocked,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCommand {
    CreateEpic,
    Approve,
    Prioritize,
    PlanSprint,
    StartSprint,
    CancelSprint,
    SprintStatus,
    UpdateTask,
    ApproveTask,
    PauseSprint,
    CompleteSprint,
    Block,
    ResumeSprint,
    SuggestFix,
    SkipTask,
    RequestChanges,
    Feedback,
    /// Query commands, accepted in every state, never transition.
    State,
    BacklogView,
    /// Backlog-mutation commands, accepted everywhere except SPRINT_REVIEW.
    BacklogAddStory,
    BacklogPrioritize,
    BacklogRemove,
}

impl WorkflowCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowCommand::CreateEpic => "create_epic",
            WorkflowCommand::Approve => "approve",
            WorkflowCommand::Prioritize => "prioritize",
            WorkflowCommand::PlanSprint => "plan_sprint",
            WorkflowCommand::StartSprint => "start_sprint",
            WorkflowCommand::CancelSprint => "cancel_sprint",
            WorkflowCommand::SprintStatus => "sprint_status",
            WorkflowCommand::UpdateTask => "update_task",
            WorkflowCommand::ApproveTask => "approve_task",
            WorkflowCommand::PauseSprint => "pause_sprint",
            WorkflowCommand::CompleteSprint => "complete_sprint",
            WorkflowCommand::Block => "block",
            WorkflowCommand::ResumeSprint => "resume_sprint",
            WorkflowCommand::SuggestFix => "suggest_fix",
            WorkflowCommand::SkipTask => "skip_task",
            WorkflowCommand::RequestChanges => "request_changes",
            WorkflowCommand::Feedback => "feedback",
            WorkflowCommand::State => "state",
            WorkflowCommand::BacklogView => "backlog view",
            WorkflowCommand::BacklogAddStory => "backlog add_story",
            WorkflowCommand::BacklogPrioritize => "backlog prioritize",
            WorkflowCommand::BacklogRemove => "backlog remove",
        }
    }

    fn is_query(self) -> bool {
        matches!(self, WorkflowCommand::State | WorkflowCommand::BacklogView)
    }

    fn is_backlog_mutation(self) -> bool {
        matches!(
            self,
            WorkflowCommand::BacklogAddStory
                | WorkflowCommand::BacklogPrioritize
                | WorkflowCommand::BacklogRemove
        )
    }

    pub fn all() -> [WorkflowCommand; 22] {
        [
            WorkflowCommand::CreateEpic,
            WorkflowCommand::Approve,
            WorkflowCommand::Prioritize,
            WorkflowCommand::PlanSprint,
            WorkflowCommand::StartSprint,
            WorkflowCommand::CancelSprint,
            WorkflowCommand::SprintStatus,
            WorkflowCommand::UpdateTask,
            WorkflowCommand::ApproveTask,
            WorkflowCommand::PauseSprint,
            WorkflowCommand::CompleteSprint,
            WorkflowCommand::Block,
            WorkflowCommand::ResumeSprint,
            WorkflowCommand::SuggestFix,
            WorkflowCommand::SkipTask,
            WorkflowCommand::RequestChanges,
            WorkflowCommand::Feedback,
            WorkflowCommand::State,
            WorkflowCommand::BacklogView,
            WorkflowCommand::BacklogAddStory,
            WorkflowCommand::BacklogPrioritize,
            WorkflowCommand::BacklogRemove,
        ]
    }
}

/// `(from, command) -> to`. Guarded entries (`plan_sprint`, `complete_sprint`)
/// are listed here with their unconditional target and checked against
/// `WorkflowGuardContext`/`has_active_tdd_cycles` before being accepted.
const TRANSITIONS: &[(WorkflowState, WorkflowCommand, WorkflowState)] = &[
    (WorkflowState::Idle, WorkflowCommand::CreateEpic, WorkflowState::BacklogReady),
    (WorkflowState::BacklogReady, WorkflowCommand::CreateEpic, WorkflowState::BacklogReady),
    (WorkflowState::BacklogReady, WorkflowCommand::Approve, WorkflowState::BacklogReady),
    (WorkflowState::BacklogReady, WorkflowCommand::Prioritize, WorkflowState::BacklogReady),
    (WorkflowState::BacklogReady, WorkflowCommand::PlanSprint, WorkflowState::SprintPlanned),
    (WorkflowState::SprintPlanned, WorkflowCommand::StartSprint, WorkflowState::SprintActive),
    (WorkflowState::SprintPlanned, WorkflowCommand::CancelSprint, WorkflowState::BacklogReady),
    (WorkflowState::SprintActive, WorkflowCommand::SprintStatus, WorkflowState::SprintActive),
    (WorkflowState::SprintActive, WorkflowCommand::UpdateTask, WorkflowState::SprintActive),
    (WorkflowState::SprintActive, WorkflowCommand::ApproveTask, WorkflowState::SprintActive),
    (WorkflowState::SprintActive, WorkflowCommand::PauseSprint, WorkflowState::SprintPaused),
    (WorkflowState::SprintActive, WorkflowCommand::CompleteSprint, WorkflowState::SprintReview),
    (WorkflowState::SprintActive, WorkflowCommand::Block, WorkflowState::Blocked),
    (WorkflowState::SprintPaused, WorkflowCommand::ResumeSprint, WorkflowState::SprintActive),
    (WorkflowState::SprintPaused, WorkflowCommand::CancelSprint, WorkflowState::BacklogReady),
    (WorkflowState::Blocked, WorkflowCommand::SuggestFix, WorkflowState::SprintActive),
    (WorkflowState::Blocked, WorkflowCommand::SkipTask, WorkflowState::SprintActive),
    (WorkflowState::SprintReview, WorkflowCommand::RequestChanges, WorkflowState::BacklogReady),
    (WorkflowState::SprintReview, WorkflowCommand::Feedback, WorkflowState::Idle),
];

/// Facts the FSM needs from the caller to evaluate guarded transitions; the
/// FSM itself holds no knowledge of story/sprint contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowGuardContext {
    pub stories_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub new_state: Option<WorkflowState>,
    pub error_message: Option<String>,
    pub hint: Option<String>,
}

impl CommandResult {
    fn ok(state: WorkflowState) -> Self {
        Self {
            success: true,
            new_state: Some(state),
            error_message: None,
            hint: None,
        }
    }

    fn unchanged() -> Self {
        Self {
            success: true,
            new_state: None,
            error_message: None,
            hint: None,
        }
    }

    fn rejected(error_message: String, hint: Option<String>) -> Self {
        Self {
            success: false,
            new_state: None,
            error_message: Some(error_message),
            hint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub command: WorkflowCommand,
}

fn hint_for(command: WorkflowCommand, state: WorkflowState) -> Option<String> {
    match (command, state) {
        (WorkflowCommand::PlanSprint, _) => {
            Some("No stories in the backlog — add stories before planning a sprint".to_string())
        }
        (WorkflowCommand::StartSprint, _) => {
            Some("No sprint planned — use plan_sprint first".to_string())
        }
        (WorkflowCommand::CompleteSprint, _) => Some(
            "Sprint has TDD cycles still in progress — commit or abandon them before completing"
                .to_string(),
        ),
        (WorkflowCommand::PauseSprint, _) | (WorkflowCommand::ApproveTask, _) => {
            Some("No sprint is currently active".to_string())
        }
        _ => None,
    }
}

/// Owns the current Workflow state and the set of story ids with a TDD cycle
/// still open. The coupling predicate (`has_active_tdd_cycles`) blocks entry
/// into `SPRINT_REVIEW`/`IDLE` while any registered cycle has not reached
/// `COMMIT`.
#[derive(Debug, Clone)]
pub struct WorkflowFsm {
    state: WorkflowState,
    active_tdd_cycles: HashMap<String, String>,
}

impl Default for WorkflowFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowFsm {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            active_tdd_cycles: HashMap::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Restores a state read back from `status.json` on orchestrator
    /// startup, bypassing the transition table. The caller is responsible
    /// for re-registering any TDD cycles the restored state depends on.
    pub fn force_state(&mut self, state: WorkflowState) {
        self.state = state;
    }

    pub fn register_tdd_cycle(&mut self, story_id: impl Into<String>, cycle_id: impl Into<String>) {
        self.active_tdd_cycles.insert(story_id.into(), cycle_id.into());
    }

    pub fn unregister_tdd_cycle(&mut self, story_id: &str) {
        self.active_tdd_cycles.remove(story_id);
    }

    pub fn has_active_tdd_cycles(&self) -> bool {
        !self.active_tdd_cycles.is_empty()
    }

    fn base_lookup(&self, command: WorkflowCommand) -> Option<WorkflowState> {
        TRANSITIONS
            .iter()
            .find(|(from, cmd, _)| *from == self.state && *cmd == command)
            .map(|(_, _, to)| *to)
    }

    pub fn validate_command(
        &self,
        command: WorkflowCommand,
        ctx: WorkflowGuardContext,
    ) -> CommandResult {
        if command.is_query() {
            return CommandResult::unchanged();
        }
        if command.is_backlog_mutation() {
            return if self.state == WorkflowState::SprintReview {
                CommandResult::rejected(
                    format!("{} is not accepted during SPRINT_REVIEW", command.as_str()),
                    Some("Resolve the sprint review before mutating the backlog".to_string()),
                )
            } else {
                CommandResult::unchanged()
            };
        }

        let Some(target) = self.base_lookup(command) else {
            return CommandResult::rejected(
                format!(
                    "`{}` is not valid from state {}",
                    command.as_str(),
                    self.state.as_str()
                ),
                hint_for(command, self.state),
            );
        };

        if command == WorkflowCommand::PlanSprint && !ctx.stories_present {
            return CommandResult::rejected(
                "plan_sprint requires at least one backlog story".to_string(),
                hint_for(command, self.state),
            );
        }
        if command == WorkflowCommand::CompleteSprint && self.has_active_tdd_cycles() {
            return CommandResult::rejected(
                "cannot complete sprint while TDD cycles remain open".to_string(),
                hint_for(command, self.state),
            );
        }

        CommandResult::ok(target)
    }

    /// Validates, and on success commits the new state. Returns the same
    /// `CommandResult`; callers construct and publish a `workflow_transition`
    /// event from the `(from, to, command)` triple on success.
    pub fn transition(
        &mut self,
        command: WorkflowCommand,
        ctx: WorkflowGuardContext,
    ) -> (CommandResult, Option<TransitionOutcome>) {
        let result = self.validate_command(command, ctx);
        if let Some(to) = result.new_state {
            let from = self.state;
            self.state = to;
            return (result, Some(TransitionOutcome { from, to, command }));
        }
        (result, None)
    }

    /// Renders the transition table as an ASCII arrow diagram.
    pub fn transition_diagram() -> String {
        let mut out = String::new();
        for (from, command, to) in TRANSITIONS {
            out.push_str(&format!(
                "{} --{}--> {}\n",
                from.as_str(),
                command.as_str(),
                to.as_str()
            ));
        }
        out
    }

    /// Dev/test-time check: every non-terminal state has an outgoing
    /// transition, and every state is reachable from IDLE.
    pub fn validate_table() -> Result<(), String> {
        for state in WorkflowState::all() {
            let has_outgoing = TRANSITIONS.iter().any(|(from, _, _)| *from == state);
            if !has_outgoing {
                return Err(format!("state {} has no outgoing transitions", state.as_str()));
            }
        }

        let mut reachable = vec![WorkflowState::Idle];
        let mut frontier = vec![WorkflowState::Idle];
        while let Some(state) = frontier.pop() {
            for (from, _, to) in TRANSITIONS {
                if *from == state && !reachable.contains(to) {
                    reachable.push(*to);
                    frontier.push(*to);
                }
            }
        }
        for state in WorkflowState::all() {
            if !reachable.contains(&state) {
                return Err(format!("state {} is not reachable from IDLE", state.as_str()));
            }
        }
        Ok(())
    }
}
