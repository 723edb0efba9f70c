use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Resolved, immutable configuration for either an `orchestratord` or a
/// single-project `orchestrator` process. Loaded once at startup through
/// three layers (defaults, optional YAML file, environment overrides); a
/// config change requires a restart rather than a hot reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct OrchestratorConfig {
    pub projects_dir: String,
    pub max_global_agents: u32,
    pub allocation_strategy: AllocationStrategy,
    pub restart_max_failures: u32,
    pub restart_window_secs: u64,
    pub log_level: String,
    pub log_file: Option<String>,
    pub approval_default_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            projects_dir: "./projects".to_string(),
            max_global_agents: 12,
            allocation_strategy: AllocationStrategy::Fair,
            restart_max_failures: 3,
            restart_window_secs: 300,
            log_level: "info".to_string(),
            log_file: None,
            approval_default_timeout_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    #[default]
    Fair,
    PriorityBased,
}

impl OrchestratorConfig {
    /// Layer 1 + 2: defaults overlaid with an optional YAML file. Unknown
    /// keys in the file are rejected outright rather than ignored, so a typo
    /// fails loudly at startup instead of silently keeping a default.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Layer 3: environment overrides, applied last and unconditionally when
    /// present. Mirrors the `ORCH_*` variable set the Supervisor sets on
    /// spawned children.
    pub fn apply_env_overrides(mut self, env_vars: &HashMap<String, String>) -> Result<Self> {
        if let Some(v) = env_vars.get("ORCH_PROJECTS_DIR") {
            self.projects_dir = v.clone();
        }
        if let Some(v) = env_vars.get("ORCH_MAX_AGENTS") {
            self.max_global_agents = v.parse().map_err(|_| {
                OrchestratorError::InvalidConfig(format!("ORCH_MAX_AGENTS not a u32: {v}"))
            })?;
        }
        if let Some(v) = env_vars.get("ORCH_LOG_LEVEL") {
            self.log_level = v.clone();
        }
        if let Some(v) = env_vars.get("ORCH_LOG_FILE") {
            self.log_file = Some(v.clone());
        }
        if let Some(v) = env_vars.get("ORCH_RESTART_MAX_FAILURES") {
            self.restart_max_failures = v.parse().map_err(|_| {
                OrchestratorError::InvalidConfig(format!(
                    "ORCH_RESTART_MAX_FAILURES not a u32: {v}"
                ))
            })?;
        }
        if let Some(v) = env_vars.get("ORCH_RESTART_WINDOW_SECS") {
            self.restart_window_secs = v.parse().map_err(|_| {
                OrchestratorError::InvalidConfig(format!(
                    "ORCH_RESTART_WINDOW_SECS not a u64: {v}"
                ))
            })?;
        }
        Ok(self)
    }

    /// Convenience wrapper that reads layer 3 straight from the process
    /// environment rather than a supplied map.
    pub fn apply_process_env_overrides(self) -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        self.apply_env_overrides(&vars)
    }

    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new("./orchestrator.yaml");
        let path = config_path.unwrap_or(default_path);
        Self::load_from_file(path)?.apply_process_env_overrides()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_sane() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_global_agents, 12);
        assert_eq!(config.allocation_strategy, AllocationStrategy::Fair);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = OrchestratorConfig::load_from_file(&path).unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orchestrator.yaml");
        std::fs::write(
            &path,
            "projects_dir: /srv/projects\nmax_global_agents: 20\nallocation_strategy: priority_based\n",
        )
        .unwrap();

        let config = OrchestratorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.projects_dir, "/srv/projects");
        assert_eq!(config.max_global_agents, 20);
        assert_eq!(config.allocation_strategy, AllocationStrategy::PriorityBased);
    }

    #[test]
    fn unknown_key_in_yaml_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orchestrator.yaml");
        std::fs::write(&path, "max_global_agents: 20\ntypo_field: true\n").unwrap();

        let result = OrchestratorConfig::load_from_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_win_over_file_and_defaults() {
        let mut env_vars = HashMap::new();
        env_vars.insert("ORCH_MAX_AGENTS".to_string(), "7".to_string());
        env_vars.insert("ORCH_LOG_LEVEL".to_string(), "debug".to_string());

        let config = OrchestratorConfig::default()
            .apply_env_overrides(&env_vars)
            .unwrap();
        assert_eq!(config.max_global_agents, 7);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn invalid_env_override_value_errors_instead_of_panicking() {
        let mut env_vars = HashMap::new();
        env_vars.insert("ORCH_MAX_AGENTS".to_string(), "not-a-number".to_string());

        let result = OrchestratorConfig::default().apply_env_overrides(&env_vars);
        assert!(result.is_err());
    }
}
