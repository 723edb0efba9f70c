use orch_types::AgentType;

/// Never permitted to any agent type, including through a `bash(*)` wildcard —
/// these override even ORCHESTRATOR's wildcard when matched as dangerous
/// patterns by `validate_bash_command`.
pub const RESTRICTED_COMMANDS: &[&str] = &[
    "sudo",
    "su",
    "chmod",
    "chown",
    "kill",
    "killall",
    "format",
    "fdisk",
    "dd",
    "shred",
    "curl",
    "wget",
    "ssh",
    "scp",
    "rsync",
    "npm publish",
    "pip install --user",
    "docker run",
    "docker exec",
];

/// Gated behind explicit approval in BLOCKING/PARTIAL modes via the command
/// pipeline's stage 4, not capability-denied outright.
pub const ELEVATED_COMMANDS: &[&str] = &["rm", "rmdir", "del", "delete", "git push"];

pub const CODE_MANAGEMENT_COMMANDS: &[&str] = &["git commit", "git add", "git reset"];

/// pytest/coverage/git-status variants permitted to QA/CODE inside their
/// phases.
pub const TDD_COMMANDS: &[&str] = &[
    "pytest",
    "pytest --collect-only",
    "pytest --dry-run",
    "coverage run",
    "coverage report",
    "git status --porcelain",
    "git diff --name-only",
];

/// Static per-agent-type policy: which tools are explicitly allowed or
/// disallowed, and which TDD phases the agent may act in at all.
pub struct AgentPolicy {
    pub allowed: &'static [&'static str],
    pub disallowed: &'static [&'static str],
    pub tdd_phases: &'static [&'static str],
}

pub const ORCHESTRATOR_POLICY: AgentPolicy = AgentPolicy {
    allowed: &[
        "Read",
        "Write",
        "Edit",
        "MultiEdit",
        "Glob",
        "Grep",
        "LS",
        "TodoRead",
        "TodoWrite",
        "WebFetch",
        "WebSearch",
        "Task",
        "bash(*)",
    ],
    disallowed: &[
        "bash(sudo)",
        "bash(su)",
        "bash(format)",
        "bash(fdisk)",
        "bash(dd)",
        "bash(shred)",
    ],
    tdd_phases: &["DESIGN", "TEST_RED", "CODE_GREEN", "REFACTOR", "COMMIT"],
};

pub const DESIGN_POLICY: AgentPolicy = AgentPolicy {
    allowed: &[
        "Read",
        "Write",
        "Glob",
        "Grep",
        "LS",
        "WebFetch",
        "WebSearch",
        "bash(ls)",
        "bash(find)",
        "bash(head)",
        "bash(tail)",
        "bash(cat)",
        "bash(tree)",
        "bash(wc)",
        "bash(grep -r)",
    ],
    disallowed: &["Edit", "MultiEdit", "TodoWrite"],
    tdd_phases: &["DESIGN"],
};

pub const CODE_POLICY: AgentPolicy = AgentPolicy {
    allowed: &[
        "Read",
        "Write",
        "Edit",
        "MultiEdit",
        "Glob",
        "Grep",
        "LS",
        "bash(python)",
        "bash(node)",
        "bash(npm)",
        "bash(pip)",
        "bash(pytest)",
        "bash(pylint)",
        "bash(flake8)",
        "bash(black)",
        "bash(mypy)",
        "bash(isort)",
        "bash(autopep8)",
        "bash(git status)",
        "bash(git diff)",
        "bash(git log)",
        "bash(git add)",
        "bash(git commit)",
        "bash(git reset)",
        "bash(ls)",
        "bash(find)",
        "bash(grep)",
        "bash(head)",
        "bash(tail)",
        "bash(cat)",
        "bash(mkdir)",
        "bash(cp)",
        "bash(mv)",
        "bash(pytest --collect-only)",
        "bash(pytest --dry-run)",
        "bash(coverage run)",
        "bash(coverage report)",
        "bash(git status --porcelain)",
        "bash(git diff --name-only)",
    ],
    disallowed: &["TodoWrite"],
    tdd_phases: &["CODE_GREEN", "REFACTOR", "COMMIT"],
};

pub const QA_POLICY: AgentPolicy = AgentPolicy {
    allowed: &[
        "Read",
        "Write",
        "Glob",
        "Grep",
        "LS",
        "bash(pytest)",
        "bash(coverage)",
        "bash(pytest --collect-only)",
        "bash(pytest --dry-run)",
        "bash(coverage run)",
        "bash(coverage report)",
        "bash(git status --porcelain)",
        "bash(git diff --name-only)",
    ],
    disallowed: &[
        "Edit",
        "MultiEdit",
        "TodoWrite",
        "bash(git add)",
        "bash(git commit)",
    ],
    tdd_phases: &["TEST_RED"],
};

pub const DATA_POLICY: AgentPolicy = AgentPolicy {
    allowed: &[
        "Read",
        "Glob",
        "Grep",
        "LS",
        "WebFetch",
        "bash(cat)",
        "bash(head)",
        "bash(tail)",
        "bash(wc)",
    ],
    disallowed: &["Write", "Edit", "MultiEdit", "TodoWrite"],
    tdd_phases: &[],
};

pub fn policy_for(agent: AgentType) -> &'static AgentPolicy {
    match agent {
        AgentType::Orchestrator => &ORCHESTRATOR_POLICY,
        AgentType::Design => &DESIGN_POLICY,
        AgentType::Code => &CODE_POLICY,
        AgentType::Qa => &QA_POLICY,
        AgentType::Data => &DATA_POLICY,
    }
}
