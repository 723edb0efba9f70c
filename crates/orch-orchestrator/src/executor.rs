use async_trait::async_trait;

use crate::task::{DispatchTask, TaskOutcome};

/// Agents are black boxes invoked through a restricted tool surface — this
/// crate never generates code, runs tests, or calls a model itself. Concrete
/// backends (a subprocess CLI, an HTTP call to a model provider) implement
/// this trait; production wiring is left to the binary crate that composes
/// an orchestrator for a real project.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, task: &DispatchTask) -> TaskOutcome;
}

/// Always succeeds immediately without doing anything. Useful for exercising
/// the dispatch loop, crash recovery, and retry bookkeeping in tests without
/// standing up a real agent backend.
#[derive(Debug, Default)]
pub struct NoopExecutor;

#[async_trait]
impl AgentExecutor for NoopExecutor {
    async fn execute(&self, task: &DispatchTask) -> TaskOutcome {
        TaskOutcome::ok(vec![format!("{} completed (noop)", task.command)], 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::AgentType;
    use serde_json::json;

    #[tokio::test]
    async fn noop_executor_always_succeeds() {
        let task = DispatchTask::new("s-1", "c-1", "t-1", AgentType::Code, "implement", json!({}));
        let outcome = NoopExecutor.execute(&task).await;
        assert!(outcome.success);
    }
}
