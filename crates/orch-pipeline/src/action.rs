use orch_fsm::{TddCommand, WorkflowCommand};
use orch_orchestrator::CommandArgs;
use orch_types::Priority;

use crate::error::PipelineError;
use crate::parse::ParsedCommand;

/// Every verb the command surface accepts, resolved down to what the
/// orchestrator actually needs to run it. Query-shaped verbs carry their own
/// `verb_key` so the gating stage (§4.7 stage 4) can exempt them without
/// having to special-case each one again.
#[derive(Debug, Clone)]
pub enum Action {
    Workflow {
        command: WorkflowCommand,
        args: CommandArgs,
        verb_key: &'static str,
    },
    ResolveApprovals {
        ids: Vec<String>,
    },
    TddStart {
        story_id: String,
        task_description: String,
    },
    TddAdvance {
        story_id: String,
        command: TddCommand,
    },
    TddAbort {
        story_id: String,
    },
    TddStatus,
    TddOverview,
    ProjectSwitch {
        name: String,
    },
    ProjectStatus,
    ProjectRegister,
    Abort,
}

impl Action {
    /// The key the gating stage checks against the per-mode tables. Query
    /// verbs (and `/approve` itself) are never gated regardless of mode.
    pub fn verb_key(&self) -> &'static str {
        match self {
            Action::Workflow { verb_key, .. } => verb_key,
            Action::ResolveApprovals { .. } => "approve",
            Action::TddStart { .. } => "tdd_start",
            Action::TddAdvance { command, .. } => match command {
                TddCommand::Design => "tdd_design",
                TddCommand::WriteTest => "tdd_test",
                TddCommand::Implement => "tdd_code",
                TddCommand::Refactor => "tdd_refactor",
                TddCommand::Commit => "tdd_commit",
            },
            Action::TddAbort { .. } => "tdd_abort",
            Action::TddStatus => "tdd_status",
            Action::TddOverview => "tdd_overview",
            Action::ProjectSwitch { .. } => "project_switch",
            Action::ProjectStatus => "project_status",
            Action::ProjectRegister => "project_register",
            Action::Abort => "abort",
        }
    }
}

fn parse_priority(word: Option<&str>) -> Option<Priority> {
    match word?.to_ascii_lowercase().as_str() {
        "top" | "critical" => Some(Priority::Critical),
        "high" => Some(Priority::High),
        "medium" | "normal" => Some(Priority::Normal),
        "low" => Some(Priority::Low),
        _ => None,
    }
}

fn split_ids(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|a| a.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Stage 2 of the pipeline: turns a syntactically valid `ParsedCommand` into
/// an `Action`, or rejects an unrecognized verb/subverb combination.
pub fn resolve_action(parsed: &ParsedCommand) -> Result<Action, PipelineError> {
    let verb = parsed.verb.as_str();
    let sub = parsed.subverb.as_deref();

    let action = match (verb, sub) {
        ("epic", _) => {
            let desc = parsed.first_arg().unwrap_or_default().to_string();
            Action::Workflow {
                command: WorkflowCommand::CreateEpic,
                args: CommandArgs {
                    title: Some(desc.clone()),
                    description: Some(desc),
                    ..Default::default()
                },
                verb_key: "epic",
            }
        }
        ("approve", _) => {
            let mut ids = parsed.args.clone();
            if let Some(sub) = sub {
                ids.insert(0, sub.to_string());
            }
            Action::ResolveApprovals { ids: split_ids(&ids) }
        }
        ("sprint", Some("plan")) => Action::Workflow {
            command: WorkflowCommand::PlanSprint,
            args: CommandArgs {
                story_ids: split_ids(&parsed.args),
                ..Default::default()
            },
            verb_key: "sprint_plan",
        },
        ("sprint", Some("start")) => Action::Workflow {
            command: WorkflowCommand::StartSprint,
            args: CommandArgs::default(),
            verb_key: "sprint_start",
        },
        ("sprint", Some("pause")) => Action::Workflow {
            command: WorkflowCommand::PauseSprint,
            args: CommandArgs::default(),
            verb_key: "sprint_pause",
        },
        ("sprint", Some("resume")) => Action::Workflow {
            command: WorkflowCommand::ResumeSprint,
            args: CommandArgs::default(),
            verb_key: "sprint_resume",
        },
        ("sprint", Some("status")) => Action::Workflow {
            command: WorkflowCommand::SprintStatus,
            args: CommandArgs::default(),
            verb_key: "sprint_status",
        },
        ("request_changes", _) => Action::Workflow {
            command: WorkflowCommand::RequestChanges,
            args: CommandArgs {
                description: parsed.first_arg().map(str::to_string),
                ..Default::default()
            },
            verb_key: "request_changes",
        },
        ("feedback", _) => Action::Workflow {
            command: WorkflowCommand::Feedback,
            args: CommandArgs {
                description: parsed.first_arg().map(str::to_string),
                ..Default::default()
            },
            verb_key: "feedback",
        },
        ("suggest_fix", _) => Action::Workflow {
            command: WorkflowCommand::SuggestFix,
            args: CommandArgs {
                description: parsed.first_arg().map(str::to_string),
                ..Default::default()
            },
            verb_key: "suggest_fix",
        },
        ("skip_task", _) => Action::Workflow {
            command: WorkflowCommand::SkipTask,
            args: CommandArgs::default(),
            verb_key: "skip_task",
        },
        ("backlog", Some("view")) => Action::Workflow {
            command: WorkflowCommand::BacklogView,
            args: CommandArgs::default(),
            verb_key: "backlog_view",
        },
        ("backlog", Some("add_story")) => Action::Workflow {
            command: WorkflowCommand::BacklogAddStory,
            args: CommandArgs {
                title: parsed.first_arg().map(str::to_string),
                description: parsed.first_arg().map(str::to_string),
                epic_id: parsed.kwargs.get("epic").cloned(),
                priority: parse_priority(parsed.kwargs.get("priority").map(String::as_str)),
                ..Default::default()
            },
            verb_key: "backlog_add_story",
        },
        ("backlog", Some("prioritize")) => Action::Workflow {
            command: WorkflowCommand::BacklogPrioritize,
            args: CommandArgs {
                story_id: parsed.args.first().cloned(),
                priority: parse_priority(parsed.args.get(1).map(String::as_str)),
                ..Default::default()
            },
            verb_key: "backlog_prioritize",
        },
        ("backlog", Some("remove")) => Action::Workflow {
            command: WorkflowCommand::BacklogRemove,
            args: CommandArgs {
                story_id: parsed.args.first().cloned(),
                ..Default::default()
            },
            verb_key: "backlog_remove",
        },
        ("state", _) => Action::Workflow {
            command: WorkflowCommand::State,
            args: CommandArgs::default(),
            verb_key: "state",
        },
        ("tdd", Some("start")) => Action::TddStart {
            story_id: parsed.first_arg().unwrap_or_default().to_string(),
            task_description: parsed
                .kwargs
                .get("task")
                .cloned()
                .unwrap_or_else(|| "unspecified task".to_string()),
        },
        ("tdd", Some("design")) => tdd_advance(parsed, TddCommand::Design)?,
        ("tdd", Some("test")) => tdd_advance(parsed, TddCommand::WriteTest)?,
        ("tdd", Some("code")) => tdd_advance(parsed, TddCommand::Implement)?,
        ("tdd", Some("refactor")) => tdd_advance(parsed, TddCommand::Refactor)?,
        ("tdd", Some("commit")) => tdd_advance(parsed, TddCommand::Commit)?,
        ("tdd", Some("abort")) => Action::TddAbort {
            story_id: parsed
                .kwargs
                .get("story")
                .cloned()
                .ok_or_else(|| PipelineError::MissingStory("tdd abort".to_string()))?,
        },
        ("tdd", Some("status")) => Action::TddStatus,
        ("tdd", Some("overview")) => Action::TddOverview,
        ("project", Some("register")) => Action::ProjectRegister,
        ("project", Some("switch")) => Action::ProjectSwitch {
            name: parsed.first_arg().unwrap_or_default().to_string(),
        },
        ("project", Some("status")) => Action::ProjectStatus,
        ("abort", _) => Action::Abort,
        _ => {
            return Err(PipelineError::UnknownCommand {
                verb: render_verb(verb, sub),
                allowed: known_verbs(),
            })
        }
    };
    Ok(action)
}

fn tdd_advance(parsed: &ParsedCommand, command: TddCommand) -> Result<Action, PipelineError> {
    let story_id = parsed
        .kwargs
        .get("story")
        .cloned()
        .ok_or_else(|| PipelineError::MissingStory(format!("tdd {}", parsed.subverb.as_deref().unwrap_or(""))))?;
    Ok(Action::TddAdvance { story_id, command })
}

fn render_verb(verb: &str, sub: Option<&str>) -> String {
    match sub {
        Some(sub) => format!("{verb} {sub}"),
        None => verb.to_string(),
    }
}

fn known_verbs() -> Vec<String> {
    [
        "epic", "approve", "sprint plan", "sprint start", "sprint pause", "sprint resume",
        "sprint status", "request_changes", "feedback", "suggest_fix", "skip_task",
        "backlog view", "backlog add_story", "backlog prioritize", "backlog remove", "state",
        "tdd start", "tdd design", "tdd test", "tdd code", "tdd refactor", "tdd commit",
        "tdd status", "tdd abort", "tdd overview", "project register", "project switch",
        "project status", "abort",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
