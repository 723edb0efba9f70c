//! Shared plumbing for the `orchestratord` and `orchestrator` binaries: the
//! on-disk registry of projects the Supervisor knows about. Everything else
//! each binary needs (config loading, logging, the Supervisor itself) lives
//! in its own crate already; this just fills the one gap neither of those
//! owns — "which projects exist and where."

pub mod agent_executor;

pub use agent_executor::ProcessAgentExecutor;

use std::path::{Path, PathBuf};

use orch_core::atomic::{atomic_write_json, read_json_with_backup};
use orch_core::error::Result;
use orch_types::{OrchestrationMode, Priority};
use serde::{Deserialize, Serialize};

const REGISTRY_FILE: &str = "projects.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRegistryEntry {
    pub name: String,
    pub path: PathBuf,
    pub mode: OrchestrationMode,
    pub priority: Priority,
    pub max_parallel_agents: u32,
    pub max_memory_mb: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRegistry {
    pub projects: Vec<ProjectRegistryEntry>,
}

impl ProjectRegistry {
    fn path_in(projects_dir: &Path) -> PathBuf {
        projects_dir.join(REGISTRY_FILE)
    }

    /// Loads the registry, or an empty one if this is the first run.
    pub fn load(projects_dir: &Path) -> Result<Self> {
        let path = Self::path_in(projects_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        read_json_with_backup(&path)
    }

    pub fn save(&self, projects_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(projects_dir)?;
        atomic_write_json(&Self::path_in(projects_dir), self)
    }

    pub fn get(&self, name: &str) -> Option<&ProjectRegistryEntry> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Inserts or replaces the entry for `entry.name`.
    pub fn upsert(&mut self, entry: ProjectRegistryEntry) {
        self.projects.retain(|p| p.name != entry.name);
        self.projects.push(entry);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.name != name);
        self.projects.len() != before
    }
}

/// The orchestration mode is a property of the project, not of any one
/// process invocation, so it has to outlive the `orchestratord` process that
/// registered it. `orchestratord project add` writes it once into the
/// project's own state directory; the standalone `orchestrator` binary reads
/// it back on startup rather than requiring it be re-specified on every spawn.
fn mode_marker_path(project_path: &Path) -> PathBuf {
    project_path.join(".orch-state").join("mode.json")
}

pub fn write_mode_marker(project_path: &Path, mode: OrchestrationMode) -> Result<()> {
    std::fs::create_dir_all(project_path.join(".orch-state"))?;
    atomic_write_json(&mode_marker_path(project_path), &mode)
}

pub fn read_mode_marker(project_path: &Path) -> OrchestrationMode {
    let path = mode_marker_path(project_path);
    if !path.exists() {
        return OrchestrationMode::Partial;
    }
    read_json_with_backup(&path).unwrap_or(OrchestrationMode::Partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(name: &str) -> ProjectRegistryEntry {
        ProjectRegistryEntry {
            name: name.to_string(),
            path: PathBuf::from(format!("/srv/{name}")),
            mode: OrchestrationMode::Partial,
            priority: Priority::Normal,
            max_parallel_agents: 3,
            max_memory_mb: 2048,
        }
    }

    #[test]
    fn missing_registry_loads_empty() {
        let dir = tempdir().unwrap();
        let registry = ProjectRegistry::load(dir.path()).unwrap();
        assert!(registry.projects.is_empty());
    }

    #[test]
    fn upsert_then_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut registry = ProjectRegistry::default();
        registry.upsert(entry("alpha"));
        registry.save(dir.path()).unwrap();

        let loaded = ProjectRegistry::load(dir.path()).unwrap();
        assert_eq!(loaded.get("alpha").unwrap().max_parallel_agents, 3);
    }

    #[test]
    fn upsert_replaces_existing_entry_with_the_same_name() {
        let mut registry = ProjectRegistry::default();
        registry.upsert(entry("alpha"));
        let mut replacement = entry("alpha");
        replacement.max_parallel_agents = 8;
        registry.upsert(replacement);

        assert_eq!(registry.projects.len(), 1);
        assert_eq!(registry.get("alpha").unwrap().max_parallel_agents, 8);
    }

    #[test]
    fn remove_reports_whether_anything_was_removed() {
        let mut registry = ProjectRegistry::default();
        registry.upsert(entry("alpha"));
        assert!(registry.remove("alpha"));
        assert!(!registry.remove("alpha"));
    }

    #[test]
    fn mode_marker_round_trips() {
        let dir = tempdir().unwrap();
        write_mode_marker(dir.path(), OrchestrationMode::Blocking).unwrap();
        assert_eq!(read_mode_marker(dir.path()), OrchestrationMode::Blocking);
    }

    #[test]
    fn missing_mode_marker_defaults_to_partial() {
        let dir = tempdir().unwrap();
        assert_eq!(read_mode_marker(dir.path()), OrchestrationMode::Partial);
    }
}
