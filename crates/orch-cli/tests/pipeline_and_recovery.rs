//! End-to-end scenarios that only make sense from the composition root: a
//! command riding the full pipeline down into the store, and a simulated
//! crash/restart picking an in-flight TDD cycle back up.

use std::sync::Arc;

use orch_orchestrator::{NoopExecutor, ProjectOrchestrator};
use orch_pipeline::{CommandPipeline, PipelineRequest};
use orch_store::ProjectStore;
use orch_types::{OrchestrationMode, Priority, Project, ResourceLimits, TddCycle};
use tempfile::tempdir;

fn init_project(path: &std::path::Path) -> ProjectStore {
    std::fs::create_dir_all(path.join(".git")).unwrap();
    let store = ProjectStore::new(path);
    store.initialize().unwrap();
    store
}

fn project(path: &std::path::Path, mode: OrchestrationMode) -> Project {
    Project {
        name: "demo".to_string(),
        path: path.to_path_buf(),
        mode,
        priority: Priority::Normal,
        resource_limits: ResourceLimits::default(),
    }
}

#[tokio::test]
async fn epic_creation_round_trips_through_pipeline_and_store() {
    let dir = tempdir().unwrap();
    let store = init_project(dir.path());
    let orchestrator = Arc::new(ProjectOrchestrator::new(
        project(dir.path(), OrchestrationMode::Autonomous),
        store,
        Arc::new(NoopExecutor),
    ));

    let pipeline = CommandPipeline::new();
    pipeline.register_project(orchestrator.clone()).await;

    let outcome = pipeline
        .dispatch(PipelineRequest {
            command: r#"/epic "first epic""#.to_string(),
            project_name: None,
            requester_id: "alice".to_string(),
        })
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.current_state, "BACKLOG_READY");

    // Reload from disk through a fresh store handle, the way a restarted
    // `orchestrator` process would, and confirm the epic actually persisted
    // rather than only existing in the orchestrator's in-memory aggregate.
    let reloaded = ProjectStore::new(dir.path());
    let aggregate = reloaded.load_project_data();
    assert_eq!(aggregate.epics.len(), 1);
    assert_eq!(aggregate.epics[0].title, "first epic");

    let status = reloaded.load_status().expect("status.json should exist after a transition");
    assert_eq!(status.workflow_state, "BACKLOG_READY");
}

#[tokio::test]
async fn blocking_mode_approval_is_visible_across_a_process_restart() {
    let dir = tempdir().unwrap();
    let store = init_project(dir.path());
    let orchestrator = Arc::new(ProjectOrchestrator::new(
        project(dir.path(), OrchestrationMode::Blocking),
        store,
        Arc::new(NoopExecutor),
    ));
    let pipeline = CommandPipeline::new();
    pipeline.register_project(orchestrator.clone()).await;

    let pending = pipeline
        .dispatch(PipelineRequest {
            command: r#"/epic "needs a human""#.to_string(),
            project_name: None,
            requester_id: "alice".to_string(),
        })
        .await
        .unwrap();
    let approval_id = pending.pending_approval_id.expect("blocking mode should hold this behind an approval");

    // Simulate a restart: a brand new `ProjectOrchestrator` built against the
    // same on-disk project, as the `orchestrator` binary would build on
    // every invocation.
    let restarted_store = ProjectStore::new(dir.path());
    let restarted = Arc::new(ProjectOrchestrator::new(
        project(dir.path(), OrchestrationMode::Blocking),
        restarted_store,
        Arc::new(NoopExecutor),
    ));
    let restarted_pipeline = CommandPipeline::new();
    restarted_pipeline.register_project(restarted.clone()).await;

    let resolved = restarted_pipeline
        .dispatch(PipelineRequest {
            command: format!("/approve {approval_id}"),
            project_name: None,
            requester_id: "bob".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(resolved.artifacts.get(&approval_id), Some(&"approved".to_string()));
    assert_eq!(resolved.current_state, "BACKLOG_READY");
}

#[tokio::test]
async fn a_tdd_cycle_crashed_with_no_current_task_opens_a_recovery_approval() {
    let dir = tempdir().unwrap();
    let store = init_project(dir.path());

    // Simulate a process that died mid-cycle after its current task was
    // cleared (e.g. between finishing one task and assigning the next) but
    // before it could persist a clean `needs_recovery = false` marker.
    let mut crashed = TddCycle::new("cycle-1".to_string(), "story-1".to_string());
    crashed.current_task_id = None;
    crashed.needs_recovery = true;
    store.save_tdd_cycle(&crashed).unwrap();

    let orchestrator = ProjectOrchestrator::new(
        project(dir.path(), OrchestrationMode::Autonomous),
        store,
        Arc::new(NoopExecutor),
    );

    let opened = orchestrator.recover().await;
    assert_eq!(opened.len(), 1);
}

#[tokio::test]
async fn a_tdd_cycle_crashed_mid_task_resumes_without_an_approval() {
    let dir = tempdir().unwrap();
    let store = init_project(dir.path());

    let orchestrator = ProjectOrchestrator::new(
        project(dir.path(), OrchestrationMode::Autonomous),
        store,
        Arc::new(NoopExecutor),
    );
    let cycle_id = orchestrator.start_tdd_cycle("story-1", "do the thing").await.unwrap();

    // `start_tdd_cycle` always creates a cycle with a current task and
    // `needs_recovery = false`; flip the flag directly on disk the way an
    // unclean shutdown would leave it, then rebuild the orchestrator fresh.
    let reopened_store = ProjectStore::new(dir.path());
    let mut cycle = reopened_store
        .list_tdd_cycles()
        .unwrap()
        .into_iter()
        .find(|c| c.id == cycle_id)
        .unwrap();
    cycle.needs_recovery = true;
    reopened_store.save_tdd_cycle(&cycle).unwrap();

    let restarted = ProjectOrchestrator::new(
        project(dir.path(), OrchestrationMode::Autonomous),
        ProjectStore::new(dir.path()),
        Arc::new(NoopExecutor),
    );
    let opened = restarted.recover().await;
    assert!(opened.is_empty());
}
