//! Agent Capability Registry: static per-agent-type tool and TDD-phase
//! policy tables plus pure evaluator functions. No mutable state, no I/O —
//! the orchestrator and command pipeline call these as a gate before
//! dispatching any tool invocation to an agent.

pub mod registry;
pub mod tables;

pub use registry::*;
pub use tables::*;
