/// Errors raised before a command ever reaches a `ProjectOrchestrator` —
/// stages 1 and 2 of the pipeline (resolve project, parse command). Anything
/// past that point is reported through `CommandOutcome::success` instead,
/// since the FSM and capability layers already carry their own hint text.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no project specified and no single default project is available")]
    NeedProject,

    #[error("unknown command `{verb}`")]
    UnknownCommand { verb: String, allowed: Vec<String> },

    #[error("project `{0}` is not registered with this pipeline")]
    UnknownProject(String),

    #[error("`{0}` requires an explicit story=<id> argument")]
    MissingStory(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Orchestrator(#[from] orch_core::OrchestratorError),
}
