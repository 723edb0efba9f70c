//! Shared data model for the orchestration core.
//!
//! Every entity here is plain data: no behavior, no I/O. The state machines
//! (`orch-fsm`), the capability registry (`orch-capability`), and the project
//! store (`orch-store`) all operate on these types rather than defining their
//! own shadow copies.

pub mod agent;
pub mod approval;
pub mod epic;
pub mod event;
pub mod project;
pub mod sprint;
pub mod story;
pub mod tdd;

pub use agent::*;
pub use approval::*;
pub use epic::*;
pub use event::*;
pub use project::*;
pub use sprint::*;
pub use story::*;
pub use tdd::*;
