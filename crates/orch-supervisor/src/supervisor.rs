use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex as StdMutex;

use chrono::Utc;
use orch_core::{AllocationStrategy, OrchestratorConfig, OrchestratorError, Result};
use orch_types::{OrchestratorEvent, Priority};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::allocation::{self, AllocationRequest};
use crate::child::{ChildRecord, ChildStatus};
use crate::restart::{RestartBudget, RestartDecision};

/// What the Supervisor needs to know about a project in order to spawn and
/// police it. The binary that owns a project directory and its
/// `orchestrator` executable builds one of these per project it hands to
/// `Supervisor::start_project`.
#[derive(Debug, Clone)]
pub struct ProjectSpawnSpec {
    pub project_name: String,
    pub priority: Priority,
    pub max_parallel_agents: u32,
    /// Path to the `orchestrator` binary to spawn for this project.
    pub binary_path: PathBuf,
    pub project_path: PathBuf,
}

struct Supervised {
    spec: ProjectSpawnSpec,
    record: ChildRecord,
    process: Option<Child>,
}

/// Global Supervisor (C6): the only thing in the system that spawns and
/// kills real OS processes. Each supervised project runs as its own
/// `orchestrator` child; this type polls them for crashes, restarts them
/// within a bounded budget, and apportions the shared agent pool across
/// whichever projects are currently running.
pub struct Supervisor {
    config: OrchestratorConfig,
    children: RwLock<HashMap<String, StdMutex<Supervised>>>,
    restart_budget: RestartBudget,
    event_sink: Box<dyn Fn(OrchestratorEvent) + Send + Sync>,
}

impl Supervisor {
    pub fn new(config: OrchestratorConfig) -> Self {
        let restart_budget =
            RestartBudget::new(config.restart_max_failures, config.restart_window_secs);
        Self {
            config,
            children: RwLock::new(HashMap::new()),
            restart_budget,
            event_sink: Box::new(|_| {}),
        }
    }

    pub fn with_event_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(OrchestratorEvent) + Send + Sync + 'static,
    {
        self.event_sink = Box::new(sink);
        self
    }

    fn emit(&self, event: OrchestratorEvent) {
        (self.event_sink)(event);
    }

    pub async fn start_project(&self, spec: ProjectSpawnSpec) -> Result<()> {
        let mut children = self.children.write().await;
        if let Some(existing) = children.get(&spec.project_name) {
            let existing = existing.lock().unwrap();
            if !existing.record.status.is_terminal() {
                return Ok(());
            }
        }

        let active_count = children
            .values()
            .filter(|c| !c.lock().unwrap().record.status.is_terminal())
            .count();
        if active_count + 1 > self.config.max_global_agents as usize {
            return Err(OrchestratorError::ResourceExhausted {
                project: spec.project_name.clone(),
                limit: self.config.max_global_agents,
            });
        }

        let child = spawn_child(&spec)?;
        let pid = child.id();
        let now = Utc::now();
        let mut record = ChildRecord::new(spec.project_name.clone(), pid, now);
        record.status = ChildStatus::Running;

        info!(project = %spec.project_name, pid, "project child started");
        children.insert(
            spec.project_name.clone(),
            StdMutex::new(Supervised {
                spec,
                record,
                process: Some(child),
            }),
        );
        Ok(())
    }

    pub async fn stop_project(&self, project_name: &str) -> Result<()> {
        let children = self.children.read().await;
        let entry = children
            .get(project_name)
            .ok_or_else(|| OrchestratorError::ProjectNotFound(project_name.to_string()))?;
        let mut entry = entry.lock().unwrap();
        terminate(&mut entry.process)?;
        entry.record.status = ChildStatus::Stopped;
        entry.record.pid = None;
        info!(project = project_name, "project child stopped");
        Ok(())
    }

    pub async fn pause_project(&self, project_name: &str) -> Result<()> {
        self.signal_project(project_name, ChildStatus::Paused, stop_signal)
            .await
    }

    pub async fn resume_project(&self, project_name: &str) -> Result<()> {
        self.signal_project(project_name, ChildStatus::Running, continue_signal)
            .await
    }

    async fn signal_project(
        &self,
        project_name: &str,
        target: ChildStatus,
        send: fn(u32) -> Result<()>,
    ) -> Result<()> {
        let children = self.children.read().await;
        let entry = children
            .get(project_name)
            .ok_or_else(|| OrchestratorError::ProjectNotFound(project_name.to_string()))?;
        let mut entry = entry.lock().unwrap();
        let pid = entry
            .record
            .pid
            .ok_or_else(|| OrchestratorError::ChildProcess(format!("{project_name} has no pid")))?;
        send(pid)?;
        entry.record.status = target;
        Ok(())
    }

    pub async fn restart_project(&self, project_name: &str) -> Result<()> {
        let spec = {
            let children = self.children.read().await;
            let entry = children
                .get(project_name)
                .ok_or_else(|| OrchestratorError::ProjectNotFound(project_name.to_string()))?;
            entry.lock().unwrap().spec.clone()
        };
        self.stop_project(project_name).await.ok();
        self.start_project(spec).await
    }

    /// One pass of the monitoring loop: poll every live child's exit status,
    /// and restart or permanently fail any that have crashed. The caller is
    /// expected to call this on a fixed interval (typically from a
    /// `tokio::time::interval` loop in the owning binary).
    pub async fn tick(&self) -> Result<()> {
        let project_names: Vec<String> = {
            let children = self.children.read().await;
            children.keys().cloned().collect()
        };

        for name in project_names {
            self.poll_one(&name).await?;
        }
        Ok(())
    }

    async fn poll_one(&self, project_name: &str) -> Result<()> {
        let children = self.children.read().await;
        let Some(entry) = children.get(project_name) else {
            return Ok(());
        };
        let mut entry = entry.lock().unwrap();
        if entry.record.status.is_terminal() || entry.record.status == ChildStatus::Paused {
            return Ok(());
        }

        let now = Utc::now();
        entry.record.last_poll = now;

        let exited = match entry.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => true,
        };
        if !exited {
            let (count, window_start) = self.restart_budget.maybe_reset(
                entry.record.restart_count,
                entry.record.restart_window_start,
                now,
            );
            entry.record.restart_count = count;
            entry.record.restart_window_start = window_start;
            return Ok(());
        }

        warn!(project = project_name, "project child exited unexpectedly");
        entry.record.status = ChildStatus::Crashed;
        entry.process = None;

        let (decision, count, window_start) = self.restart_budget.record_crash(
            entry.record.restart_count,
            entry.record.restart_window_start,
            now,
        );
        entry.record.restart_count = count;
        entry.record.restart_window_start = window_start;

        match decision {
            RestartDecision::Allow => {
                let spec = entry.spec.clone();
                match spawn_child(&spec) {
                    Ok(child) => {
                        entry.record.pid = Some(child.id());
                        entry.record.status = ChildStatus::Running;
                        entry.record.start_time = now;
                        entry.process = Some(child);
                        info!(project = project_name, attempt = count, "project child restarted");
                    }
                    Err(e) => {
                        warn!(project = project_name, error = %e, "restart spawn failed");
                        entry.record.status = ChildStatus::Error;
                        self.emit(OrchestratorEvent::ProjectError {
                            project: project_name.to_string(),
                            restart_count: count,
                            ts: now,
                        });
                    }
                }
            }
            RestartDecision::Deny => {
                entry.record.status = ChildStatus::Error;
                self.emit(OrchestratorEvent::ProjectError {
                    project: project_name.to_string(),
                    restart_count: count,
                    ts: now,
                });
            }
        }
        Ok(())
    }

    pub async fn status(&self, project_name: &str) -> Option<ChildRecord> {
        let children = self.children.read().await;
        children
            .get(project_name)
            .map(|entry| entry.lock().unwrap().record.clone())
    }

    pub async fn list_statuses(&self) -> Vec<ChildRecord> {
        let children = self.children.read().await;
        children
            .values()
            .map(|entry| entry.lock().unwrap().record.clone())
            .collect()
    }

    /// Recomputes the agent-pool split across every non-terminal project
    /// using the configured allocation strategy.
    pub async fn allocate(&self) -> HashMap<String, u32> {
        let children = self.children.read().await;
        let requests: Vec<AllocationRequest> = children
            .values()
            .filter_map(|entry| {
                let entry = entry.lock().unwrap();
                if entry.record.status.is_terminal() {
                    None
                } else {
                    Some(AllocationRequest {
                        project_name: entry.spec.project_name.clone(),
                        priority: entry.spec.priority,
                        requested: entry.spec.max_parallel_agents,
                    })
                }
            })
            .collect();
        allocation::allocate(
            self.config.allocation_strategy,
            self.config.max_global_agents,
            &requests,
        )
    }
}

fn spawn_child(spec: &ProjectSpawnSpec) -> Result<Child> {
    let mut cmd = Command::new(&spec.binary_path);
    cmd.arg("run")
        .arg("--project")
        .arg(&spec.project_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    cmd.spawn()
        .map_err(|e| OrchestratorError::ChildProcess(format!("failed to spawn {}: {e}", spec.project_name)))
}

fn terminate(process: &mut Option<Child>) -> Result<()> {
    let Some(child) = process.as_mut() else {
        return Ok(());
    };
    let pid = child.id();

    #[cfg(unix)]
    {
        let _ = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            child
                .kill()
                .map_err(|e| OrchestratorError::ChildProcess(format!("failed to kill {pid}: {e}")))?;
            let _ = child.wait();
        }
    }
    *process = None;
    Ok(())
}

#[cfg(unix)]
fn stop_signal(pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(pid as i32, libc::SIGSTOP) };
    if rc != 0 {
        return Err(OrchestratorError::ChildProcess(format!(
            "SIGSTOP failed for pid {pid}"
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn stop_signal(_pid: u32) -> Result<()> {
    Err(OrchestratorError::ChildProcess(
        "pause is only supported on unix targets".to_string(),
    ))
}

#[cfg(unix)]
fn continue_signal(pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(pid as i32, libc::SIGCONT) };
    if rc != 0 {
        return Err(OrchestratorError::ChildProcess(format!(
            "SIGCONT failed for pid {pid}"
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn continue_signal(_pid: u32) -> Result<()> {
    Err(OrchestratorError::ChildProcess(
        "resume is only supported on unix targets".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn spec(name: &str, binary: &str) -> ProjectSpawnSpec {
        ProjectSpawnSpec {
            project_name: name.to_string(),
            priority: Priority::Normal,
            max_parallel_agents: 3,
            binary_path: PathBuf::from(binary),
            project_path: PathBuf::from("/tmp/does-not-matter"),
        }
    }

    #[tokio::test]
    async fn start_project_records_a_running_child() {
        let supervisor = Supervisor::new(OrchestratorConfig::default());
        supervisor
            .start_project(spec("demo", "/bin/sleep"))
            .await
            .unwrap();
        let status = supervisor.status("demo").await.unwrap();
        assert_eq!(status.status, ChildStatus::Running);
        supervisor.stop_project("demo").await.unwrap();
    }

    #[tokio::test]
    async fn stop_project_marks_the_record_stopped() {
        let supervisor = Supervisor::new(OrchestratorConfig::default());
        supervisor
            .start_project(spec("demo", "/bin/sleep"))
            .await
            .unwrap();
        supervisor.stop_project("demo").await.unwrap();
        let status = supervisor.status("demo").await.unwrap();
        assert_eq!(status.status, ChildStatus::Stopped);
    }

    #[tokio::test]
    async fn stop_project_on_unknown_project_errors() {
        let supervisor = Supervisor::new(OrchestratorConfig::default());
        let result = supervisor.stop_project("ghost").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tick_marks_an_exited_child_crashed_and_restarts_it() {
        let mut config = OrchestratorConfig::default();
        config.restart_max_failures = 3;
        config.restart_window_secs = 300;
        let supervisor = Supervisor::new(config);
        // `true` exits immediately with status 0, simulating a crash.
        supervisor
            .start_project(spec("demo", "/bin/true"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        supervisor.tick().await.unwrap();
        let status = supervisor.status("demo").await.unwrap();
        assert_eq!(status.status, ChildStatus::Running);
        assert_eq!(status.restart_count, 1);
        supervisor.stop_project("demo").await.unwrap();
    }

    #[tokio::test]
    async fn exhausting_the_restart_budget_marks_the_project_errored() {
        let mut config = OrchestratorConfig::default();
        config.restart_max_failures = 1;
        config.restart_window_secs = 300;
        let error_events = Arc::new(AtomicUsize::new(0));
        let counter = error_events.clone();
        let supervisor = Supervisor::new(config).with_event_sink(move |event| {
            if matches!(event, OrchestratorEvent::ProjectError { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        supervisor
            .start_project(spec("demo", "/bin/true"))
            .await
            .unwrap();
        for _ in 0..3 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            supervisor.tick().await.unwrap();
        }

        let status = supervisor.status("demo").await.unwrap();
        assert_eq!(status.status, ChildStatus::Error);
        assert!(error_events.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn start_project_rejects_the_nth_plus_one_project_over_the_global_cap() {
        let mut config = OrchestratorConfig::default();
        config.max_global_agents = 2;
        let supervisor = Supervisor::new(config);

        supervisor.start_project(spec("a", "/bin/sleep")).await.unwrap();
        supervisor.start_project(spec("b", "/bin/sleep")).await.unwrap();

        let result = supervisor.start_project(spec("c", "/bin/sleep")).await;
        assert!(matches!(result, Err(OrchestratorError::ResourceExhausted { .. })));

        supervisor.stop_project("a").await.unwrap();
        supervisor.stop_project("b").await.unwrap();
    }

    #[tokio::test]
    async fn allocate_splits_capacity_fairly_by_default() {
        let supervisor = Supervisor::new(OrchestratorConfig::default());
        supervisor
            .start_project(spec("a", "/bin/sleep"))
            .await
            .unwrap();
        supervisor
            .start_project(spec("b", "/bin/sleep"))
            .await
            .unwrap();
        let allocation = supervisor.allocate().await;
        assert_eq!(allocation.len(), 2);
        supervisor.stop_project("a").await.unwrap();
        supervisor.stop_project("b").await.unwrap();
    }
}
