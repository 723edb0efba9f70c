use orch_types::AgentType;
use regex::Regex;

use crate::tables::{policy_for, ELEVATED_COMMANDS, RESTRICTED_COMMANDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BashCommandReport {
    pub allowed: bool,
    pub risk_level: RiskLevel,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
}

fn bash_inner(tool: &str) -> Option<&str> {
    tool.strip_prefix("bash(")?.strip_suffix(')')
}

/// Pure lookup: no I/O, memoizable by `(agent, tool)` if ever needed under
/// load, though the tables are small enough that a cache has not been worth
/// adding.
pub fn validate_tool(agent: AgentType, tool: &str) -> bool {
    let policy = policy_for(agent);

    if policy.disallowed.iter().any(|d| *d == tool) {
        return false;
    }
    if policy.allowed.iter().any(|a| *a == tool) {
        return true;
    }

    if let Some(requested) = bash_inner(tool) {
        let contained = policy.allowed.iter().any(|entry| {
            bash_inner(entry)
                .map(|allowed_cmd| allowed_cmd == "*" || allowed_cmd.contains(requested))
                .unwrap_or(false)
        });
        if contained {
            return is_restricted_keyword(requested).is_none();
        }
        return false;
    }

    false
}

fn is_restricted_keyword(command: &str) -> Option<&'static str> {
    RESTRICTED_COMMANDS
        .iter()
        .find(|kw| command.contains(*kw))
        .copied()
}

/// Per-agent-type TDD phase gating: DESIGN only in DESIGN, QA only in
/// TEST_RED, CODE in CODE_GREEN|REFACTOR|COMMIT, DATA in none of the editing
/// phases, ORCHESTRATOR in all.
pub fn validate_tdd_phase(agent: AgentType, phase: &str) -> bool {
    policy_for(agent).tdd_phases.iter().any(|p| *p == phase)
}

fn dangerous_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"rm\s+-rf\s+/(\s|$)").unwrap(),
        Regex::new(r"\bsudo\b").unwrap(),
        Regex::new(r"curl[^|]*\|\s*sh\b").unwrap(),
        Regex::new(r"wget[^|]*\|\s*sh\b").unwrap(),
        Regex::new(r"\$\([^)]*\)").unwrap(),
        Regex::new(r"`[^`]*`").unwrap(),
        Regex::new(r"\.\./\.\./").unwrap(),
    ]
}

/// Command-level wrapper over `validate_tool` for the `bash(...)` family:
/// additionally screens the literal command string against dangerous regex
/// patterns regardless of what the capability table would otherwise allow.
pub fn validate_bash_command(agent: AgentType, command: &str) -> BashCommandReport {
    let tool = format!("bash({command})");
    let mut violations = Vec::new();
    let mut recommendations = Vec::new();

    let capability_allowed = validate_tool(agent, &tool);
    if !capability_allowed {
        violations.push(format!(
            "`{command}` is not permitted for agent type {}",
            agent.as_str()
        ));
    }

    let mut matched_dangerous = false;
    for pattern in dangerous_patterns() {
        if pattern.is_match(command) {
            matched_dangerous = true;
            violations.push(format!("matches dangerous pattern `{}`", pattern.as_str()));
        }
    }

    if let Some(keyword) = is_restricted_keyword(command) {
        violations.push(format!("contains restricted keyword `{keyword}`"));
    }

    let elevated = ELEVATED_COMMANDS.iter().any(|e| command.contains(e));
    if elevated {
        recommendations
            .push("this command requires explicit human approval before execution".to_string());
    }

    let risk_level = if matched_dangerous || is_restricted_keyword(command).is_some() {
        RiskLevel::Critical
    } else if elevated {
        RiskLevel::High
    } else if !capability_allowed {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if violations.is_empty() {
        recommendations.push("no policy violations detected".to_string());
    }

    BashCommandReport {
        allowed: capability_allowed && !matched_dangerous && is_restricted_keyword(command).is_none(),
        risk_level,
        violations,
        recommendations,
    }
}
