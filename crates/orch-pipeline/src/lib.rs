//! Command Pipeline (C7): resolves the target project, parses slash
//! commands, checks the project's own Workflow FSM admissibility, gates
//! state-changing commands behind an Approval per orchestration mode, and
//! dispatches into the Per-Project Orchestrator.

pub mod action;
pub mod error;
pub mod gating;
pub mod parse;
pub mod pipeline;

pub use action::{resolve_action, Action};
pub use error::PipelineError;
pub use gating::requires_approval;
pub use parse::{parse_command_line, ParsedCommand};
pub use pipeline::{CommandPipeline, PipelineRequest};
