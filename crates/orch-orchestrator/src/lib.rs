//! Per-Project Orchestrator (C5): owns one project's Workflow FSM and TDD
//! cycles, dispatches `DispatchTask`s to agents through an `AgentExecutor`,
//! and is the only writer of that project's state through the Project Store.

pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod task;

pub use executor::{AgentExecutor, NoopExecutor};
pub use orchestrator::{CommandArgs, CommandOutcome, ProjectOrchestrator};
pub use task::{DispatchTask, DispatchTaskState, TaskOutcome};
