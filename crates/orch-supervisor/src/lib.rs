//! Global Supervisor (C6): spawns and polices one OS child process per
//! running project, restarts crashed children within a bounded budget, and
//! apportions the shared agent pool across them.

pub mod allocation;
pub mod child;
pub mod restart;
pub mod supervisor;

pub use allocation::{allocate, AllocationRequest};
pub use child::{ChildRecord, ChildStatus};
pub use restart::{RestartBudget, RestartDecision};
pub use supervisor::{ProjectSpawnSpec, Supervisor};
