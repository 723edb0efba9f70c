//! The two coupled state machines at the heart of a project: the Workflow
//! FSM (epic/sprint lifecycle) and the TDD FSM (per-story red/green/refactor
//! cycle). Both are pure: they hold only their own state and return a result
//! plus an optional transition outcome, leaving persistence and event
//! publication to the orchestrator.

pub mod tdd;
pub mod workflow;

pub use tdd::*;
pub use workflow::*;
