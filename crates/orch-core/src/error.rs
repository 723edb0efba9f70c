use thiserror::Error;

/// Single error taxonomy for the orchestration core. FSM and capability
/// rejections are returned as ordinary `Result` values to their callers
/// (they are expected control flow, not failures); this enum covers the
/// failures that can legitimately abort an operation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("storage corrupt at {path}: {reason}")]
    StorageCorrupt { path: String, reason: String },

    #[error("storage degraded: {0}")]
    StorageDegraded(String),

    #[error("child process error: {0}")]
    ChildProcess(String),

    #[error("resource exhausted: starting {project} would exceed max_global_agents ({limit})")]
    ResourceExhausted { project: String, limit: u32 },

    #[error("approval {0} not found")]
    ApprovalNotFound(String),

    #[error("approval {0} expired before resolution")]
    ApprovalExpired(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
