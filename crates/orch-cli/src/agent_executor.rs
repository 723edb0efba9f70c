use std::time::Instant;

use async_trait::async_trait;
use orch_orchestrator::{AgentExecutor, DispatchTask, TaskOutcome};
use tokio::process::Command;

/// Invokes an external agent binary as a subprocess per dispatched task,
/// matching the trait's documented "a subprocess CLI" backend. The binary is
/// invoked as `<agent_command> <tdd phase> <json context on stdin>`; success
/// is the child's exit status, stdout lines become `TaskOutcome::messages`.
pub struct ProcessAgentExecutor {
    agent_command: String,
}

impl ProcessAgentExecutor {
    pub fn new(agent_command: impl Into<String>) -> Self {
        Self {
            agent_command: agent_command.into(),
        }
    }
}

#[async_trait]
impl AgentExecutor for ProcessAgentExecutor {
    async fn execute(&self, task: &DispatchTask) -> TaskOutcome {
        use std::io::Write;
        use std::process::Stdio;

        let started = Instant::now();
        let mut command = Command::new(&self.agent_command);
        command
            .arg(task.agent_type.as_str())
            .arg(&task.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return TaskOutcome::failed(format!("failed to spawn agent command: {e}"), started.elapsed().as_secs_f64()),
        };

        if let Some(mut stdin) = child.stdin.take() {
            let payload = task.context.to_string();
            let _ = tokio::task::spawn_blocking(move || stdin.write_all(payload.as_bytes())).await;
        }

        match child.wait_with_output().await {
            Ok(output) => {
                let duration_s = started.elapsed().as_secs_f64();
                let messages: Vec<String> = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .map(str::to_string)
                    .collect();
                if output.status.success() {
                    TaskOutcome::ok(messages, duration_s)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    TaskOutcome::failed(
                        format!("agent exited with {}: {stderr}", output.status),
                        duration_s,
                    )
                }
            }
            Err(e) => TaskOutcome::failed(format!("agent process error: {e}"), started.elapsed().as_secs_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::AgentType;
    use serde_json::json;

    fn task(command: &str) -> DispatchTask {
        DispatchTask::new("story-1", "cycle-1", "task-1", AgentType::Code, command, json!({"hint": "test"}))
    }

    #[tokio::test]
    async fn successful_exit_maps_stdout_lines_to_messages() {
        let executor = ProcessAgentExecutor::new("echo");
        let outcome = executor.execute(&task("hello")).await;
        assert!(outcome.success);
        assert!(outcome.messages.iter().any(|m| m.contains("hello")));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_failure() {
        let executor = ProcessAgentExecutor::new("false");
        let outcome = executor.execute(&task("doesn't matter")).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn missing_binary_is_reported_as_failure_not_a_panic() {
        let executor = ProcessAgentExecutor::new("this-binary-should-not-exist-anywhere");
        let outcome = executor.execute(&task("anything")).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("failed to spawn"));
    }
}
