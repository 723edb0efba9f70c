use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use orch_approval::ApprovalLedger;
use orch_capability::validate_tdd_phase;
use orch_core::event_bus::EventBus;
use orch_core::error::{OrchestratorError, Result};
use orch_fsm::{
    apply_transition, CommandResult, TddCommand, TddCommandResult, TransitionOutcome,
    WorkflowCommand, WorkflowFsm, WorkflowGuardContext,
};
use orch_store::ProjectStore;
use orch_types::{
    AgentType, Epic, EpicStatus, Priority, Project, ProjectAggregate, ProjectStatusRecord,
    OrchestratorEvent, Sprint, SprintStatus, Story, StoryStatus, TddCycle, TddState, TddTask,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::executor::AgentExecutor;
use crate::task::{DispatchTask, DispatchTaskState, TaskOutcome};

/// The fields `handle_command` needs from a parsed command; the Command
/// Pipeline (C7) is responsible for turning raw args into this shape.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub story_id: Option<String>,
    pub story_ids: Vec<String>,
    pub epic_id: Option<String>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    pub current_state: String,
    pub hint: Option<String>,
    pub allowed_commands: Vec<String>,
    pub artifacts: HashMap<String, String>,
    pub pending_approval_id: Option<String>,
}

/// A workflow transition held open behind an Approval (C9); `resolve_approval`
/// replays it through `handle_command` once a human approves, or discards it
/// on rejection/timeout.
#[derive(Debug, Clone)]
struct PendingTransition {
    command: WorkflowCommand,
    args: CommandArgs,
    requester: String,
}

/// Owns one project's Workflow FSM and the set of TDD cycles registered
/// under it. The in-memory aggregate, once loaded, is authoritative; every
/// accepted mutation is flushed back through the Project Store before the
/// command returns.
pub struct ProjectOrchestrator {
    project: Project,
    store: ProjectStore,
    events: EventBus,
    approvals: ApprovalLedger,
    executor: Arc<dyn AgentExecutor>,
    workflow: RwLock<WorkflowFsm>,
    aggregate: RwLock<ProjectAggregate>,
    cycles: RwLock<HashMap<String, TddCycle>>,
    story_cycle: RwLock<HashMap<String, String>>,
    dispatches: RwLock<HashMap<String, DispatchTask>>,
    pending_transitions: RwLock<HashMap<String, PendingTransition>>,
    cancel_token: CancellationToken,
    pause_signal: RwLock<bool>,
    task_semaphore: Arc<Semaphore>,
    llm_semaphore: Arc<Semaphore>,
}

impl ProjectOrchestrator {
    pub fn new(project: Project, store: ProjectStore, executor: Arc<dyn AgentExecutor>) -> Self {
        let aggregate = store.load_project_data();
        let max_parallel = project.resource_limits.max_parallel_agents.max(1) as usize;

        let mut workflow = WorkflowFsm::new();
        let mut story_cycle = HashMap::new();
        let mut cycles = HashMap::new();
        if let Ok(persisted) = store.list_tdd_cycles() {
            for cycle in persisted {
                if !cycle.is_complete() {
                    workflow.register_tdd_cycle(cycle.story_id.clone(), cycle.id.clone());
                    story_cycle.insert(cycle.story_id.clone(), cycle.id.clone());
                }
                cycles.insert(cycle.id.clone(), cycle);
            }
        }
        if let Some(status) = store.load_status() {
            if let Some(state) = parse_workflow_state(&status.workflow_state) {
                workflow.force_state(state);
            }
        }

        Self {
            project,
            store,
            events: EventBus::new(),
            approvals: ApprovalLedger::new(),
            executor,
            workflow: RwLock::new(workflow),
            aggregate: RwLock::new(aggregate),
            cycles: RwLock::new(cycles),
            story_cycle: RwLock::new(story_cycle),
            dispatches: RwLock::new(HashMap::new()),
            pending_transitions: RwLock::new(HashMap::new()),
            cancel_token: CancellationToken::new(),
            pause_signal: RwLock::new(false),
            task_semaphore: Arc::new(Semaphore::new(max_parallel)),
            llm_semaphore: Arc::new(Semaphore::new(max_parallel.min(4))),
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn project_name(&self) -> &str {
        &self.project.name
    }

    pub fn mode(&self) -> orch_types::OrchestrationMode {
        self.project.mode
    }

    pub async fn current_state(&self) -> orch_fsm::WorkflowState {
        self.workflow.read().await.state()
    }

    /// Flags every cycle marked `needs_recovery` on disk: resumes cycles
    /// whose current task is unambiguous, and opens an approval for any
    /// whose current task id is missing (the orchestrator cannot tell which
    /// task was in flight when it crashed).
    pub async fn recover(&self) -> Vec<String> {
        let mut opened = Vec::new();
        let mut cycles = self.cycles.write().await;
        for cycle in cycles.values_mut() {
            if !cycle.needs_recovery {
                continue;
            }
            if cycle.current_task().is_some() {
                tracing::info!(cycle = %cycle.id, story = %cycle.story_id, "resuming TDD cycle from last known phase");
                cycle.needs_recovery = false;
                let _ = self.store.save_tdd_cycle(cycle);
            } else {
                let approval = self
                    .approvals
                    .open(
                        self.project.name.clone(),
                        format!(
                            "cycle {} for story {} crashed with no current task; how should it resume?",
                            cycle.id, cycle.story_id
                        ),
                        serde_json::json!({"cycle_id": cycle.id, "story_id": cycle.story_id}),
                        None,
                    )
                    .await;
                opened.push(approval.id);
            }
        }
        opened
    }

    /// Validates and applies `command` against the Workflow FSM, performs the
    /// corresponding domain mutation, persists, and emits a
    /// `workflow_transition` event on success. Approval gating is the
    /// Command Pipeline's responsibility (stage 4); this method always
    /// applies an accepted command immediately.
    pub async fn handle_command(
        &self,
        command: WorkflowCommand,
        args: CommandArgs,
        requester: &str,
    ) -> CommandOutcome {
        let stories_present = !self.aggregate.read().await.stories.is_empty();
        let ctx = WorkflowGuardContext { stories_present };

        let (result, outcome) = {
            let mut workflow = self.workflow.write().await;
            workflow.transition(command, ctx)
        };

        if !result.success {
            return self.outcome_from(result, ctx).await;
        }

        if let Err(err) = self.apply_domain_mutation(command, &args).await {
            tracing::error!(error = %err, command = command.as_str(), "domain mutation failed after FSM accepted transition");
            return CommandOutcome {
                success: false,
                message: format!("storage error applying {}: {err}", command.as_str()),
                current_state: self.workflow.read().await.state().as_str().to_string(),
                hint: None,
                allowed_commands: self.allowed_commands(ctx).await,
                artifacts: HashMap::new(),
                pending_approval_id: None,
            };
        }

        if let Some(transition) = &outcome {
            self.publish_transition(transition, command, requester).await;
        }
        self.flush().await.ok();

        self.outcome_from(result, ctx).await
    }

    async fn outcome_from(&self, result: CommandResult, ctx: WorkflowGuardContext) -> CommandOutcome {
        let current_state = self.workflow.read().await.state();
        CommandOutcome {
            success: result.success,
            message: if result.success {
                "ok".to_string()
            } else {
                result.error_message.clone().unwrap_or_default()
            },
            current_state: current_state.as_str().to_string(),
            hint: result.hint.clone(),
            allowed_commands: self.allowed_commands(ctx).await,
            artifacts: HashMap::new(),
            pending_approval_id: None,
        }
    }

    async fn allowed_commands(&self, ctx: WorkflowGuardContext) -> Vec<String> {
        let workflow = self.workflow.read().await;
        WorkflowCommand::all()
            .into_iter()
            .filter(|c| workflow.validate_command(*c, ctx).success)
            .map(|c| c.as_str().to_string())
            .collect()
    }

    async fn publish_transition(
        &self,
        transition: &TransitionOutcome,
        command: WorkflowCommand,
        requester: &str,
    ) {
        self.events.publish(OrchestratorEvent::WorkflowTransition {
            project: self.project.name.clone(),
            from: transition.from.as_str().to_string(),
            to: transition.to.as_str().to_string(),
            command: command.as_str().to_string(),
            requester: requester.to_string(),
            ts: Utc::now(),
        });
    }

    async fn apply_domain_mutation(&self, command: WorkflowCommand, args: &CommandArgs) -> Result<()> {
        let mut aggregate = self.aggregate.write().await;
        match command {
            WorkflowCommand::CreateEpic => {
                let epic = Epic::new(
                    uuid::Uuid::new_v4().to_string(),
                    args.title.clone().unwrap_or_default(),
                    args.description.clone().unwrap_or_default(),
                    args.priority.unwrap_or(Priority::Normal),
                );
                aggregate.epics.push(epic);
            }
            WorkflowCommand::BacklogAddStory => {
                let mut story = Story::new(
                    uuid::Uuid::new_v4().to_string(),
                    args.title.clone().unwrap_or_default(),
                    args.description.clone().unwrap_or_default(),
                    3,
                );
                story.epic_id = args.epic_id.clone();
                if let Some(epic_id) = &story.epic_id {
                    if let Some(epic) = aggregate.epics.iter_mut().find(|e| &e.id == epic_id) {
                        epic.story_ids.push(story.id.clone());
                    }
                }
                aggregate.stories.push(story);
            }
            WorkflowCommand::BacklogPrioritize => {
                if let Some(story_id) = &args.story_id {
                    if let Some(story) = aggregate.stories.iter_mut().find(|s| &s.id == story_id) {
                        story.priority = priority_rank(args.priority);
                    }
                }
            }
            WorkflowCommand::BacklogRemove => {
                if let Some(story_id) = &args.story_id {
                    aggregate.stories.retain(|s| &s.id != story_id);
                }
            }
            WorkflowCommand::PlanSprint => {
                let sprint = Sprint::new(
                    uuid::Uuid::new_v4().to_string(),
                    args.title.clone().unwrap_or_default(),
                    args.story_ids.clone(),
                );
                for story_id in &args.story_ids {
                    if let Some(story) = aggregate.stories.iter_mut().find(|s| &s.id == story_id) {
                        story.sprint_id = Some(sprint.id.clone());
                        story.status = StoryStatus::Sprint;
                    }
                }
                aggregate.sprints.push(sprint);
            }
            WorkflowCommand::StartSprint => {
                if let Some(sprint) = aggregate
                    .sprints
                    .iter_mut()
                    .find(|s| s.status == SprintStatus::Planned)
                {
                    sprint.status = SprintStatus::Active;
                    sprint.start_date = Some(Utc::now());
                }
            }
            WorkflowCommand::CancelSprint => {
                if let Some(sprint) = aggregate.sprints.iter_mut().find(|s| {
                    matches!(s.status, SprintStatus::Planned | SprintStatus::Active)
                }) {
                    sprint.status = SprintStatus::Cancelled;
                }
            }
            WorkflowCommand::CompleteSprint => {
                if let Some(sprint) = aggregate
                    .sprints
                    .iter_mut()
                    .find(|s| s.status == SprintStatus::Active)
                {
                    sprint.status = SprintStatus::Completed;
                    sprint.end_date = Some(Utc::now());
                }
            }
            WorkflowCommand::Feedback => {
                for epic in aggregate.epics.iter_mut() {
                    if epic.status == EpicStatus::Active
                        && epic
                            .story_ids
                            .iter()
                            .all(|id| {
                                aggregate
                                    .stories
                                    .iter()
                                    .find(|s| &s.id == id)
                                    .map(|s| s.status == StoryStatus::Done)
                                    .unwrap_or(true)
                            })
                    {
                        epic.status = EpicStatus::Completed;
                    }
                }
            }
            _ => {}
        }
        drop(aggregate);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let aggregate = self.aggregate.read().await;
        self.store.save_project_data(&aggregate)?;
        drop(aggregate);
        self.flush_status().await
    }

    async fn flush_status(&self) -> Result<()> {
        let aggregate = self.aggregate.read().await;
        let workflow = self.workflow.read().await;
        let story_cycle = self.story_cycle.read().await;
        let status = ProjectStatusRecord {
            workflow_state: workflow.state().as_str().to_string(),
            active_tdd_cycle_ids: story_cycle.values().cloned().collect(),
            run_summary: aggregate.run_summary(),
            updated_at: Utc::now(),
        };
        self.store.save_status(&status)
    }

    /// Opens an approval gating `command`; the proposed transition is held
    /// until `resolve_approval` is called.
    pub async fn request_approval(
        &self,
        summary: impl Into<String>,
        command: WorkflowCommand,
        args: CommandArgs,
        requester: impl Into<String>,
    ) -> String {
        let requester = requester.into();
        let approval = self
            .approvals
            .open(self.project.name.clone(), summary, serde_json::json!({}), None)
            .await;
        self.pending_transitions.write().await.insert(
            approval.id.clone(),
            PendingTransition {
                command,
                args,
                requester,
            },
        );
        self.events.publish(OrchestratorEvent::ApprovalPending {
            project: self.project.name.clone(),
            approval_id: approval.id.clone(),
            summary: approval.summary.clone(),
            ts: Utc::now(),
        });
        approval.id
    }

    /// Resolves a pending approval: on approval, replays the held command
    /// through `handle_command`; on rejection or timeout, discards it.
    pub async fn resolve_approval(
        &self,
        id: &str,
        approved: bool,
        resolver: impl Into<String>,
        feedback: Option<String>,
    ) -> Result<Option<CommandOutcome>> {
        let resolution = if approved {
            orch_types::ApprovalResolution::Approved
        } else {
            orch_types::ApprovalResolution::Rejected
        };
        self.approvals
            .resolve(id, resolution, resolver, feedback)
            .await?;
        self.events.publish(OrchestratorEvent::ApprovalResolved {
            project: self.project.name.clone(),
            approval_id: id.to_string(),
            resolution: format!("{resolution:?}").to_uppercase(),
            ts: Utc::now(),
        });

        let pending = self.pending_transitions.write().await.remove(id);
        let Some(pending) = pending else {
            return Ok(None);
        };
        if !approved {
            return Ok(None);
        }
        let outcome = self
            .handle_command(pending.command, pending.args, &pending.requester)
            .await;
        Ok(Some(outcome))
    }

    /// Creates a new TDD cycle for `story_id` with a single starting task,
    /// registers it with the Workflow FSM, and persists it.
    pub async fn start_tdd_cycle(&self, story_id: &str, task_description: &str) -> Result<String> {
        let cycle_id = uuid::Uuid::new_v4().to_string();
        let mut cycle = TddCycle::new(cycle_id.clone(), story_id.to_string());
        let task = TddTask::new(
            uuid::Uuid::new_v4().to_string(),
            cycle_id.clone(),
            task_description.to_string(),
        );
        cycle.current_task_id = Some(task.id.clone());
        cycle.tasks.push(task);

        self.store.save_tdd_cycle(&cycle)?;
        self.workflow
            .write()
            .await
            .register_tdd_cycle(story_id, cycle_id.clone());
        self.story_cycle
            .write()
            .await
            .insert(story_id.to_string(), cycle_id.clone());
        self.cycles.write().await.insert(cycle_id.clone(), cycle);

        {
            let mut aggregate = self.aggregate.write().await;
            if let Some(story) = aggregate.stories.iter_mut().find(|s| s.id == story_id) {
                story.tdd_cycle_id = Some(cycle_id.clone());
                story.status = StoryStatus::InProgress;
            }
        }
        self.flush().await?;
        Ok(cycle_id)
    }

    /// Applies `command` to the story's active TDD cycle. On success, emits
    /// a `tdd_transition` event, dispatches a new `DispatchTask` to the agent
    /// permitted for the resulting phase, and (for the final `Commit` of the
    /// last task) unregisters the cycle from the Workflow FSM.
    pub async fn advance_tdd(&self, story_id: &str, command: TddCommand) -> Result<TddCommandResult> {
        let cycle_id = self
            .story_cycle
            .read()
            .await
            .get(story_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::InvalidOperation(format!("no active TDD cycle for story {story_id}")))?;

        let coverage_threshold = self.aggregate.read().await.tdd_settings.coverage_threshold;

        let (result, task_id, done) = {
            let mut cycles = self.cycles.write().await;
            let cycle = cycles
                .get_mut(&cycle_id)
                .ok_or_else(|| OrchestratorError::InvalidOperation(format!("cycle {cycle_id} not found")))?;
            let task_id = cycle.current_task_id.clone().unwrap_or_default();
            let from = cycle.current_state;
            let result = apply_transition(cycle, &task_id, command, coverage_threshold);
            if result.success {
                self.store.save_tdd_cycle(cycle)?;
                self.events.publish(OrchestratorEvent::TddTransition {
                    project: self.project.name.clone(),
                    story: story_id.to_string(),
                    cycle: cycle_id.clone(),
                    from: from.as_phase_str().to_string(),
                    to: cycle.current_state.as_phase_str().to_string(),
                    ts: Utc::now(),
                });
            }
            let done = cycle.is_complete();
            (result, task_id, done)
        };

        if result.success {
            if done {
                self.workflow.write().await.unregister_tdd_cycle(story_id);
                self.story_cycle.write().await.remove(story_id);
                if let Some(state) = result.new_state {
                    if state == TddState::Commit {
                        let mut aggregate = self.aggregate.write().await;
                        if let Some(story) = aggregate.stories.iter_mut().find(|s| s.id == story_id) {
                            story.status = StoryStatus::Review;
                        }
                    }
                }
            } else if let Some(state) = result.new_state {
                self.enqueue_dispatch(story_id, &cycle_id, &task_id, state).await;
            }
            self.flush().await?;
        }

        Ok(result)
    }

    /// Cancels the story's active TDD cycle without requiring it to reach
    /// `COMMIT`. The cycle's on-disk record is left in place for audit (it
    /// is not deleted, just unregistered), the story falls back to
    /// `SPRINT`, and any dispatch still pending for it is dropped.
    pub async fn abort_tdd_cycle(&self, story_id: &str) -> Result<()> {
        let cycle_id = self
            .story_cycle
            .write()
            .await
            .remove(story_id)
            .ok_or_else(|| OrchestratorError::InvalidOperation(format!("no active TDD cycle for story {story_id}")))?;

        self.workflow.write().await.unregister_tdd_cycle(story_id);
        self.dispatches.write().await.retain(|_, task| task.story_id != story_id);

        {
            let mut aggregate = self.aggregate.write().await;
            if let Some(story) = aggregate.stories.iter_mut().find(|s| s.id == story_id) {
                story.tdd_cycle_id = None;
                story.status = StoryStatus::Sprint;
            }
        }

        tracing::info!(story_id, cycle_id, "tdd cycle aborted");
        self.flush().await
    }

    async fn enqueue_dispatch(&self, story_id: &str, cycle_id: &str, task_id: &str, phase: TddState) {
        let agent_type = agent_for_phase(phase);
        if !validate_tdd_phase(agent_type, phase.as_phase_str()) {
            tracing::warn!(phase = phase.as_phase_str(), "no agent type permitted for this TDD phase");
            return;
        }
        let task = DispatchTask::new(
            story_id,
            cycle_id,
            task_id,
            agent_type,
            phase.as_command_str(),
            serde_json::json!({"story_id": story_id, "cycle_id": cycle_id}),
        );
        self.dispatches.write().await.insert(story_id.to_string(), task);
    }

    /// Drains completed dispatches and schedules newly-runnable ones, up to
    /// `max_parallel_agents`. Intended to be called on a tick from the
    /// binary's event loop; cancellation and pause are checked first so a
    /// request raised mid-tick is honored before new work is admitted.
    pub async fn tick(&self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        if *self.pause_signal.read().await {
            return;
        }

        let pending_story_ids: Vec<String> = {
            let dispatches = self.dispatches.read().await;
            dispatches
                .iter()
                .filter(|(_, t)| t.state == DispatchTaskState::Pending)
                .map(|(id, _)| id.clone())
                .collect()
        };

        for story_id in pending_story_ids {
            let permit = match self.task_semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let task = {
                let mut dispatches = self.dispatches.write().await;
                let Some(task) = dispatches.get_mut(&story_id) else {
                    continue;
                };
                task.state = DispatchTaskState::Running;
                task.clone()
            };

            let executor = self.executor.clone();
            let _llm_permit = self.llm_semaphore.clone().try_acquire_owned().ok();
            let outcome = executor.execute(&task).await;
            drop(permit);
            self.handle_task_outcome(&story_id, outcome).await;
        }
    }

    async fn handle_task_outcome(&self, story_id: &str, outcome: TaskOutcome) {
        let mut dispatches = self.dispatches.write().await;
        let Some(task) = dispatches.get_mut(story_id) else {
            return;
        };
        task.state = if outcome.success {
            DispatchTaskState::Succeeded
        } else {
            DispatchTaskState::Failed
        };
        let task_id = task.id.clone();
        let agent_type = task.agent_type;
        drop(dispatches);

        self.events.publish(OrchestratorEvent::TaskResult {
            project: self.project.name.clone(),
            task: task_id,
            agent: agent_type.as_str().to_string(),
            success: outcome.success,
            duration_s: outcome.duration_s,
        });

        if outcome.success {
            self.dispatches.write().await.remove(story_id);
        } else {
            self.retry_or_block(story_id).await;
        }
    }

    async fn retry_or_block(&self, story_id: &str) {
        let mut dispatches = self.dispatches.write().await;
        let Some(task) = dispatches.get_mut(story_id) else {
            return;
        };
        task.attempt += 1;
        if task.attempt >= task.max_retries {
            tracing::error!(story = story_id, "task retries exhausted, blocking workflow");
            dispatches.remove(story_id);
            drop(dispatches);
            let ctx = WorkflowGuardContext {
                stories_present: !self.aggregate.read().await.stories.is_empty(),
            };
            self.workflow.write().await.transition(WorkflowCommand::Block, ctx);
            self.flush_status().await.ok();
        } else {
            task.state = DispatchTaskState::Pending;
            let delay = crate::retry::backoff_delay(task.attempt);
            drop(dispatches);
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn pause(&self) {
        *self.pause_signal.write().await = true;
    }

    pub async fn resume(&self) {
        *self.pause_signal.write().await = false;
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// A read-only snapshot for monitoring, matching what the Supervisor
    /// polls for aggregated metrics and what `orchestratord status` renders
    /// absent a control socket.
    pub async fn get_status(&self) -> ProjectStatusRecord {
        let aggregate = self.aggregate.read().await;
        let workflow = self.workflow.read().await;
        let story_cycle = self.story_cycle.read().await;
        ProjectStatusRecord {
            workflow_state: workflow.state().as_str().to_string(),
            active_tdd_cycle_ids: story_cycle.values().cloned().collect(),
            run_summary: aggregate.run_summary(),
            updated_at: Utc::now(),
        }
    }
}

fn priority_rank(priority: Option<Priority>) -> u8 {
    match priority {
        Some(Priority::Critical) => 1,
        Some(Priority::High) => 2,
        Some(Priority::Normal) => 3,
        Some(Priority::Low) => 5,
        None => 3,
    }
}

/// The agent type permitted to act in a given TDD phase, per the Agent
/// Capability Registry's `tdd_phases` tables: DESIGN in DESIGN, QA in
/// TEST_RED, CODE in CODE_GREEN/REFACTOR/COMMIT.
fn agent_for_phase(phase: TddState) -> AgentType {
    match phase {
        TddState::Design => AgentType::Design,
        TddState::TestRed => AgentType::Qa,
        TddState::CodeGreen | TddState::Refactor | TddState::Commit => AgentType::Code,
    }
}

fn parse_workflow_state(s: &str) -> Option<orch_fsm::WorkflowState> {
    use orch_fsm::WorkflowState::*;
    Some(match s {
        "IDLE" => Idle,
        "BACKLOG_READY" => BacklogReady,
        "SPRINT_PLANNED" => SprintPlanned,
        "SPRINT_ACTIVE" => SprintActive,
        "SPRINT_PAUSED" => SprintPaused,
        "SPRINT_REVIEW" => SprintReview,
        "BLOCKED" => Blocked,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NoopExecutor;
    use orch_types::{OrchestrationMode, ResourceLimits};
    use tempfile::tempdir;

    fn test_project(path: &std::path::Path) -> ProjectOrchestrator {
        std::fs::create_dir_all(path.join(".git")).unwrap();
        let store = ProjectStore::new(path);
        store.initialize().unwrap();
        let project = Project {
            name: "demo".to_string(),
            path: path.to_path_buf(),
            mode: OrchestrationMode::Autonomous,
            priority: Priority::Normal,
            resource_limits: ResourceLimits::default(),
        };
        ProjectOrchestrator::new(project, store, Arc::new(NoopExecutor))
    }

    #[tokio::test]
    async fn create_epic_moves_workflow_and_persists() {
        let dir = tempdir().unwrap();
        let orchestrator = test_project(dir.path());

        let outcome = orchestrator
            .handle_command(
                WorkflowCommand::CreateEpic,
                CommandArgs {
                    title: Some("Epic one".to_string()),
                    ..Default::default()
                },
                "cli",
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.current_state, "BACKLOG_READY");
        let status = orchestrator.get_status().await;
        assert_eq!(status.workflow_state, "BACKLOG_READY");
    }

    #[tokio::test]
    async fn plan_sprint_rejected_without_stories() {
        let dir = tempdir().unwrap();
        let orchestrator = test_project(dir.path());
        orchestrator
            .handle_command(WorkflowCommand::CreateEpic, CommandArgs::default(), "cli")
            .await;

        let outcome = orchestrator
            .handle_command(WorkflowCommand::PlanSprint, CommandArgs::default(), "cli")
            .await;
        assert!(!outcome.success);
        assert!(outcome.hint.is_some());
    }

    #[tokio::test]
    async fn full_backlog_to_sprint_active_flow() {
        let dir = tempdir().unwrap();
        let orchestrator = test_project(dir.path());

        orchestrator
            .handle_command(WorkflowCommand::CreateEpic, CommandArgs::default(), "cli")
            .await;
        let add_story = orchestrator
            .handle_command(
                WorkflowCommand::BacklogAddStory,
                CommandArgs {
                    title: Some("Story one".to_string()),
                    ..Default::default()
                },
                "cli",
            )
            .await;
        assert!(add_story.success);

        let story_id = orchestrator.aggregate.read().await.stories[0].id.clone();
        let plan = orchestrator
            .handle_command(
                WorkflowCommand::PlanSprint,
                CommandArgs {
                    title: Some("Sprint 1".to_string()),
                    story_ids: vec![story_id],
                    ..Default::default()
                },
                "cli",
            )
            .await;
        assert!(plan.success);
        assert_eq!(plan.current_state, "SPRINT_PLANNED");

        let start = orchestrator
            .handle_command(WorkflowCommand::StartSprint, CommandArgs::default(), "cli")
            .await;
        assert!(start.success);
        assert_eq!(start.current_state, "SPRINT_ACTIVE");
    }

    #[tokio::test]
    async fn tdd_cycle_blocks_sprint_completion_until_committed() {
        let dir = tempdir().unwrap();
        let orchestrator = test_project(dir.path());
        orchestrator
            .handle_command(WorkflowCommand::CreateEpic, CommandArgs::default(), "cli")
            .await;
        orchestrator
            .handle_command(
                WorkflowCommand::BacklogAddStory,
                CommandArgs {
                    title: Some("Story one".to_string()),
                    ..Default::default()
                },
                "cli",
            )
            .await;
        let story_id = orchestrator.aggregate.read().await.stories[0].id.clone();
        orchestrator
            .handle_command(
                WorkflowCommand::PlanSprint,
                CommandArgs {
                    story_ids: vec![story_id.clone()],
                    ..Default::default()
                },
                "cli",
            )
            .await;
        orchestrator
            .handle_command(WorkflowCommand::StartSprint, CommandArgs::default(), "cli")
            .await;

        orchestrator.start_tdd_cycle(&story_id, "implement the thing").await.unwrap();

        let complete = orchestrator
            .handle_command(WorkflowCommand::CompleteSprint, CommandArgs::default(), "cli")
            .await;
        assert!(!complete.success);
    }

    #[tokio::test]
    async fn approval_flow_applies_command_only_once_approved() {
        let dir = tempdir().unwrap();
        let orchestrator = test_project(dir.path());

        let approval_id = orchestrator
            .request_approval(
                "create the first epic",
                WorkflowCommand::CreateEpic,
                CommandArgs {
                    title: Some("Epic one".to_string()),
                    ..Default::default()
                },
                "cli",
            )
            .await;

        assert_eq!(orchestrator.workflow.read().await.state().as_str(), "IDLE");

        let result = orchestrator
            .resolve_approval(&approval_id, true, "alice", None)
            .await
            .unwrap();
        let outcome = result.unwrap();
        assert!(outcome.success);
        assert_eq!(orchestrator.workflow.read().await.state().as_str(), "BACKLOG_READY");
    }

    #[tokio::test]
    async fn rejected_approval_never_applies_the_command() {
        let dir = tempdir().unwrap();
        let orchestrator = test_project(dir.path());

        let approval_id = orchestrator
            .request_approval(
                "create the first epic",
                WorkflowCommand::CreateEpic,
                CommandArgs::default(),
                "cli",
            )
            .await;

        let result = orchestrator
            .resolve_approval(&approval_id, false, "alice", Some("not now".to_string()))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(orchestrator.workflow.read().await.state().as_str(), "IDLE");
    }
}
