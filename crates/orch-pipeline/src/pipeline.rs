use std::collections::HashMap;
use std::sync::Arc;

use orch_orchestrator::{CommandArgs, CommandOutcome, ProjectOrchestrator};
use tokio::sync::RwLock;

use crate::action::{resolve_action, Action};
use crate::error::PipelineError;
use crate::gating::requires_approval;
use crate::parse::parse_command_line;

/// A single request moving through the pipeline: the raw command text, the
/// project it targets (if the caller already knows), and who sent it.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub command: String,
    pub project_name: Option<String>,
    pub requester_id: String,
}

/// Stages 1-7 of the Command Pipeline (C7): resolves the target project,
/// parses the command, defers to the project's own FSM/capability checks,
/// gates state-changing commands behind an Approval per orchestration mode,
/// dispatches, and returns a structured response. Holds no state of its own
/// beyond the project registry and each requester's last-active project —
/// everything else lives in the `ProjectOrchestrator`s it dispatches to.
pub struct CommandPipeline {
    projects: RwLock<HashMap<String, Arc<ProjectOrchestrator>>>,
    last_active: RwLock<HashMap<String, String>>,
}

impl Default for CommandPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPipeline {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            last_active: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_project(&self, orchestrator: Arc<ProjectOrchestrator>) {
        let name = orchestrator.project_name().to_string();
        self.projects.write().await.insert(name, orchestrator);
    }

    pub async fn unregister_project(&self, project_name: &str) {
        self.projects.write().await.remove(project_name);
    }

    pub async fn project_names(&self) -> Vec<String> {
        self.projects.read().await.keys().cloned().collect()
    }

    async fn resolve_project(
        &self,
        requester_id: &str,
        requested: Option<&str>,
    ) -> Result<Arc<ProjectOrchestrator>, PipelineError> {
        let projects = self.projects.read().await;

        if let Some(name) = requested {
            return projects
                .get(name)
                .cloned()
                .ok_or_else(|| PipelineError::UnknownProject(name.to_string()));
        }

        if let Some(name) = self.last_active.read().await.get(requester_id) {
            if let Some(orch) = projects.get(name) {
                return Ok(orch.clone());
            }
        }

        if projects.len() == 1 {
            return Ok(projects.values().next().unwrap().clone());
        }

        Err(PipelineError::NeedProject)
    }

    /// Runs the full 1-7 pipeline for one command and returns its structured
    /// response. Stage 6 (event emission) happens inside `ProjectOrchestrator`
    /// itself, since that's the component that actually knows the
    /// before/after state pair; this method only orders stages 1-5 and 7.
    pub async fn dispatch(&self, request: PipelineRequest) -> Result<CommandOutcome, PipelineError> {
        let orchestrator = self
            .resolve_project(&request.requester_id, request.project_name.as_deref())
            .await?;
        self.last_active
            .write()
            .await
            .insert(request.requester_id.clone(), orchestrator.project_name().to_string());

        let parsed = parse_command_line(&request.command).ok_or_else(|| PipelineError::UnknownCommand {
            verb: request.command.clone(),
            allowed: Vec::new(),
        })?;
        let action = resolve_action(&parsed)?;

        self.run_action(&orchestrator, action, &request.requester_id).await
    }

    async fn run_action(
        &self,
        orchestrator: &Arc<ProjectOrchestrator>,
        action: Action,
        requester_id: &str,
    ) -> Result<CommandOutcome, PipelineError> {
        match action {
            Action::Workflow { command, args, verb_key } => {
                let mode = orchestrator.mode();
                let state = orchestrator.current_state().await;
                if requires_approval(mode, state, verb_key) {
                    let summary = format!("{verb_key} requires approval ({mode:?} mode)");
                    let id = orchestrator
                        .request_approval(summary.clone(), command, args, requester_id)
                        .await;
                    return Ok(pending_outcome(state.as_str(), summary, id));
                }
                Ok(orchestrator.handle_command(command, args, requester_id).await)
            }
            Action::ResolveApprovals { ids } => self.resolve_approvals(orchestrator, &ids, requester_id).await,
            Action::TddStart { story_id, task_description } => {
                let cycle_id = orchestrator.start_tdd_cycle(&story_id, &task_description).await?;
                Ok(base_outcome(orchestrator, requester_id, format!("started tdd cycle {cycle_id} for {story_id}"), [("tdd_cycle_id".to_string(), cycle_id)]).await)
            }
            Action::TddAdvance { story_id, command } => {
                let result = orchestrator.advance_tdd(&story_id, command).await?;
                let message = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "ok".to_string());
                let mut outcome = base_outcome(orchestrator, requester_id, message, []).await;
                outcome.success = result.success;
                outcome.hint = result.hint.clone();
                Ok(outcome)
            }
            Action::TddAbort { story_id } => {
                orchestrator.abort_tdd_cycle(&story_id).await?;
                Ok(base_outcome(orchestrator, requester_id, format!("aborted tdd cycle for {story_id}"), []).await)
            }
            Action::TddStatus | Action::TddOverview => {
                let status = orchestrator.get_status().await;
                let artifacts = [(
                    "tdd_active_cycle_count".to_string(),
                    status.active_tdd_cycle_ids.len().to_string(),
                )];
                Ok(base_outcome(orchestrator, requester_id, "ok".to_string(), artifacts).await)
            }
            Action::ProjectSwitch { name } => {
                if !self.projects.read().await.contains_key(&name) {
                    return Err(PipelineError::UnknownProject(name));
                }
                self.last_active.write().await.insert(requester_id.to_string(), name.clone());
                let target = self.projects.read().await.get(&name).cloned().unwrap();
                Ok(base_outcome(&target, requester_id, format!("switched to project {name}"), []).await)
            }
            Action::ProjectStatus => {
                Ok(base_outcome(orchestrator, requester_id, format!("project {}", orchestrator.project_name()), []).await)
            }
            Action::ProjectRegister => Err(PipelineError::Internal(
                "project register must go through the Supervisor, not the command pipeline".to_string(),
            )),
            Action::Abort => {
                orchestrator.cancel();
                Ok(base_outcome(orchestrator, requester_id, "cancellation requested".to_string(), []).await)
            }
        }
    }

    async fn resolve_approvals(
        &self,
        orchestrator: &Arc<ProjectOrchestrator>,
        ids: &[String],
        requester_id: &str,
    ) -> Result<CommandOutcome, PipelineError> {
        let mut artifacts = HashMap::new();
        for id in ids {
            match orchestrator.resolve_approval(id, true, requester_id, None).await {
                Ok(Some(_)) => {
                    artifacts.insert(id.clone(), "approved".to_string());
                }
                Ok(None) => {
                    artifacts.insert(id.clone(), "rejected_or_unknown".to_string());
                }
                Err(e) => {
                    artifacts.insert(id.clone(), format!("error: {e}"));
                }
            }
        }
        let mut outcome = base_outcome(orchestrator, requester_id, format!("resolved {} approval(s)", ids.len()), []).await;
        outcome.artifacts.extend(artifacts);
        Ok(outcome)
    }
}

/// Stage 7's response shape for actions that don't themselves go through
/// `handle_command` (TDD, approvals, project switch, abort): reuses the
/// Workflow FSM's own query path (`State` never transitions) to get a
/// correctly populated `current_state`/`allowed_commands` envelope, then the
/// caller overwrites `message`/`artifacts` with the action-specific payload.
async fn base_outcome(
    orchestrator: &ProjectOrchestrator,
    requester_id: &str,
    message: String,
    artifacts: impl IntoIterator<Item = (String, String)>,
) -> CommandOutcome {
    let mut outcome = orchestrator
        .handle_command(orch_fsm::WorkflowCommand::State, CommandArgs::default(), requester_id)
        .await;
    outcome.message = message;
    outcome.artifacts = artifacts.into_iter().collect();
    outcome
}

fn pending_outcome(current_state: &str, message: String, approval_id: String) -> CommandOutcome {
    CommandOutcome {
        success: true,
        message,
        current_state: current_state.to_string(),
        hint: Some("awaiting approval; use /approve <id> to proceed".to_string()),
        allowed_commands: vec!["approve".to_string()],
        artifacts: HashMap::new(),
        pending_approval_id: Some(approval_id),
    }
}
