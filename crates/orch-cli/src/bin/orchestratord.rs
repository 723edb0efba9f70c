use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use orch_cli::{ProjectRegistry, ProjectRegistryEntry};
use orch_core::config::OrchestratorConfig;
use orch_observability::{init_process_logging, ProcessKind};
use orch_store::ProjectStore;
use orch_supervisor::{ProjectSpawnSpec, Supervisor};
use orch_types::{OrchestrationMode, Priority};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "orchestratord", about = "Global Supervisor process")]
struct Cli {
    #[arg(long, env = "ORCH_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "ORCH_PROJECTS_DIR")]
    projects: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the supervisor loop. This is the default when no subcommand is given.
    Run,
    /// Prints each registered project's last-known status.
    Status,
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    Add {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "partial")]
        mode: String,
        #[arg(long, default_value = "normal")]
        priority: String,
        #[arg(long, default_value_t = 3)]
        max_agents: u32,
        #[arg(long, default_value_t = 2048)]
        max_memory_mb: u32,
    },
    Remove {
        name: String,
    },
    List,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match OrchestratorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal configuration error: {e}");
            return std::process::ExitCode::from(1);
        }
    };

    let projects_dir = cli
        .projects
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.projects_dir));

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("fatal configuration error: failed to start tokio runtime: {e}");
                    return std::process::ExitCode::from(1);
                }
            };
            runtime.block_on(run(config, &projects_dir))
        }
        Command::Status => print_status(&projects_dir),
        Command::Project { action } => project_action(action, &projects_dir),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            std::process::ExitCode::from(3)
        }
    }
}

async fn run(config: OrchestratorConfig, projects_dir: &PathBuf) -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &config.log_level);
    }
    let logs_dir = orch_observability::canonical_logs_dir_from_root(projects_dir);
    let _guard = init_process_logging(ProcessKind::Supervisor, &logs_dir, 14)?;

    let registry = ProjectRegistry::load(projects_dir)?;
    if registry.projects.is_empty() {
        warn!("no projects registered; run `orchestratord project add <path>` first");
    }

    let supervisor = Supervisor::new(config).with_event_sink(|event| {
        error!(?event, "supervisor event");
    });

    let binary_path = orchestrator_binary_path()?;
    for project in &registry.projects {
        let spec = ProjectSpawnSpec {
            project_name: project.name.clone(),
            priority: project.priority,
            max_parallel_agents: project.max_parallel_agents,
            binary_path: binary_path.clone(),
            project_path: project.path.clone(),
        };
        supervisor.start_project(spec).await?;
        info!(project = %project.name, "project started under supervision");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                supervisor.tick().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, stopping supervised projects");
                for project in &registry.projects {
                    supervisor.stop_project(&project.name).await.ok();
                }
                break;
            }
        }
    }
    Ok(())
}

/// Locates the `orchestrator` binary next to this one, mirroring the way the
/// Supervisor is documented to spawn project children (§10.4's contract).
fn orchestrator_binary_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow::anyhow!("orchestratord executable has no parent directory"))?;
    let name = if cfg!(windows) { "orchestrator.exe" } else { "orchestrator" };
    Ok(dir.join(name))
}

fn print_status(projects_dir: &PathBuf) -> anyhow::Result<()> {
    let registry = ProjectRegistry::load(projects_dir)?;
    if registry.projects.is_empty() {
        println!("no projects registered");
        return Ok(());
    }

    println!("{:<20} {:<10} {:<14} {:<10}", "PROJECT", "MODE", "STATE", "CYCLES");
    for project in &registry.projects {
        let store = ProjectStore::new(&project.path);
        match store.load_status() {
            Some(status) => println!(
                "{:<20} {:<10} {:<14} {:<10}",
                project.name,
                format!("{:?}", project.mode),
                status.workflow_state,
                status.active_tdd_cycle_ids.len()
            ),
            None => println!(
                "{:<20} {:<10} {:<14} {:<10}",
                project.name,
                format!("{:?}", project.mode),
                "UNKNOWN",
                "-"
            ),
        }
    }
    Ok(())
}

fn project_action(action: ProjectAction, projects_dir: &PathBuf) -> anyhow::Result<()> {
    let mut registry = ProjectRegistry::load(projects_dir)?;
    match action {
        ProjectAction::Add {
            path,
            name,
            mode,
            priority,
            max_agents,
            max_memory_mb,
        } => {
            let name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unnamed".to_string())
            });
            let store = ProjectStore::new(&path);
            store.initialize()?;
            let mode = parse_mode(&mode)?;
            orch_cli::write_mode_marker(&path, mode)?;
            registry.upsert(ProjectRegistryEntry {
                name: name.clone(),
                path,
                mode,
                priority: parse_priority(&priority)?,
                max_parallel_agents: max_agents,
                max_memory_mb,
            });
            registry.save(projects_dir)?;
            println!("registered project {name}");
        }
        ProjectAction::Remove { name } => {
            if registry.remove(&name) {
                registry.save(projects_dir)?;
                println!("removed project {name}");
            } else {
                println!("no such project: {name}");
            }
        }
        ProjectAction::List => {
            for project in &registry.projects {
                println!("{}\t{}", project.name, project.path.display());
            }
        }
    }
    Ok(())
}

fn parse_mode(s: &str) -> anyhow::Result<OrchestrationMode> {
    match s.to_ascii_lowercase().as_str() {
        "blocking" => Ok(OrchestrationMode::Blocking),
        "partial" => Ok(OrchestrationMode::Partial),
        "autonomous" => Ok(OrchestrationMode::Autonomous),
        "collaborative" => Ok(OrchestrationMode::Collaborative),
        other => Err(anyhow::anyhow!("unknown orchestration mode: {other}")),
    }
}

fn parse_priority(s: &str) -> anyhow::Result<Priority> {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Ok(Priority::Critical),
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        "low" => Ok(Priority::Low),
        other => Err(anyhow::anyhow!("unknown priority: {other}")),
    }
}
