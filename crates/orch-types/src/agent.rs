use serde::{Deserialize, Serialize};

/// The five roles the Agent Capability Registry grants permissions to.
/// Distinct from the teacher's Mission/AgentRole taxonomy: each variant here
/// maps to a TDD phase or cross-cutting concern rather than a generic
/// worker/reviewer split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentType {
    Orchestrator,
    Design,
    Code,
    Qa,
    Data,
}

impl AgentType {
    pub fn all() -> [AgentType; 5] {
        [
            AgentType::Orchestrator,
            AgentType::Design,
            AgentType::Code,
            AgentType::Qa,
            AgentType::Data,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentType::Orchestrator => "ORCHESTRATOR",
            AgentType::Design => "DESIGN",
            AgentType::Code => "CODE",
            AgentType::Qa => "QA",
            AgentType::Data => "DATA",
        }
    }
}
