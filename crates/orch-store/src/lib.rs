//! Project Store (C1): the sole owner of a project's on-disk state under
//! `<project>/.orch-state/`. The per-project orchestrator is the sole
//! mutator of the in-memory aggregate this crate loads and persists; nothing
//! else reads or writes these files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use orch_core::atomic::{atomic_write_json, read_json_with_backup};
use orch_core::error::{OrchestratorError, Result};
use orch_types::{ProjectAggregate, ProjectStatusRecord, Sprint, StorageHealthReport, TddCycle};

const STATE_DIR: &str = ".orch-state";

const ARCHITECTURE_TEMPLATE: &str = "# Architecture\n\n_Not yet documented._\n";
const BEST_PRACTICES_TEMPLATE: &str = "# Best Practices\n\n_Not yet documented._\n";

pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            root: project_path.into(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    fn backlog_path(&self) -> PathBuf {
        self.state_dir().join("backlog.json")
    }

    fn sprint_path(&self, id: &str) -> PathBuf {
        self.state_dir().join("sprints").join(format!("{id}.json"))
    }

    fn tdd_cycle_path(&self, id: &str) -> PathBuf {
        self.state_dir()
            .join("tdd_cycles")
            .join(format!("{id}.json"))
    }

    fn status_path(&self) -> PathBuf {
        self.state_dir().join("status.json")
    }

    fn tdd_backups_dir(&self) -> PathBuf {
        self.state_dir().join("backups").join("tdd_cycles")
    }

    /// Creates the directory tree and seeds empty/templated files. Fails if
    /// `project_path` does not exist or has no version-control marker
    /// (`.git`), since an orchestrator should never be pointed at an
    /// untracked scratch directory by mistake.
    pub fn initialize(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "project path {:?} does not exist",
                self.root
            )));
        }
        if !self.root.join(".git").exists() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "project path {:?} has no version-control marker (.git)",
                self.root
            )));
        }

        std::fs::create_dir_all(self.state_dir().join("sprints"))?;
        std::fs::create_dir_all(self.state_dir().join("tdd_cycles"))?;
        std::fs::create_dir_all(self.tdd_backups_dir())?;

        let backlog_path = self.backlog_path();
        if !backlog_path.exists() {
            atomic_write_json(&backlog_path, &ProjectAggregate::default())?;
        }

        let architecture_path = self.state_dir().join("architecture.md");
        if !architecture_path.exists() {
            std::fs::write(&architecture_path, ARCHITECTURE_TEMPLATE)?;
        }
        let best_practices_path = self.state_dir().join("best-practices.md");
        if !best_practices_path.exists() {
            std::fs::write(&best_practices_path, BEST_PRACTICES_TEMPLATE)?;
        }

        Ok(())
    }

    /// Loads the full backlog aggregate. Falls back to `.backup` on JSON
    /// decode failure; if both are unreadable, returns an empty aggregate
    /// and logs rather than propagating the error, matching the failure
    /// semantics of `load_project_data`.
    pub fn load_project_data(&self) -> ProjectAggregate {
        match read_json_with_backup(&self.backlog_path()) {
            Ok(aggregate) => aggregate,
            Err(err) => {
                tracing::warn!(error = %err, "backlog.json and its backup are both unreadable, returning empty aggregate");
                ProjectAggregate::default()
            }
        }
    }

    pub fn save_project_data(&self, aggregate: &ProjectAggregate) -> Result<()> {
        std::fs::create_dir_all(self.state_dir())?;
        atomic_write_json(&self.backlog_path(), aggregate)
    }

    pub fn load_sprint(&self, id: &str) -> Result<Sprint> {
        read_json_with_backup(&self.sprint_path(id))
    }

    pub fn save_sprint(&self, sprint: &Sprint) -> Result<()> {
        std::fs::create_dir_all(self.state_dir().join("sprints"))?;
        atomic_write_json(&self.sprint_path(&sprint.id), sprint)
    }

    /// Loads the orchestrator's last self-reported status, defaulting to
    /// `None` rather than an error — a fresh project has never written one.
    pub fn load_status(&self) -> Option<ProjectStatusRecord> {
        read_json_with_backup(&self.status_path()).ok()
    }

    pub fn save_status(&self, status: &ProjectStatusRecord) -> Result<()> {
        std::fs::create_dir_all(self.state_dir())?;
        atomic_write_json(&self.status_path(), status)
    }

    pub fn load_tdd_cycle(&self, id: &str) -> Result<TddCycle> {
        read_json_with_backup(&self.tdd_cycle_path(id))
    }

    pub fn save_tdd_cycle(&self, cycle: &TddCycle) -> Result<()> {
        std::fs::create_dir_all(self.state_dir().join("tdd_cycles"))?;
        atomic_write_json(&self.tdd_cycle_path(&cycle.id), cycle)
    }

    /// Scans `tdd_cycles/*.json` by modification time (descending) and
    /// returns the first cycle that is not yet complete.
    pub fn get_active_tdd_cycle(&self) -> Result<Option<TddCycle>> {
        let dir = self.state_dir().join("tdd_cycles");
        if !dir.exists() {
            return Ok(None);
        }

        let mut entries: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            entries.push((modified, path));
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, path) in entries {
            if let Ok(cycle) = read_json_with_backup::<TddCycle>(&path) {
                if !cycle.is_complete() {
                    return Ok(Some(cycle));
                }
            }
        }
        Ok(None)
    }

    /// Loads every TDD cycle under `tdd_cycles/`, including completed ones.
    /// Used at orchestrator startup to find cycles left `needs_recovery` by
    /// an unclean shutdown; `get_active_tdd_cycle` only ever surfaces the
    /// single most-recently-touched open cycle, which is not enough for
    /// recovering a project with several stories in flight at once.
    pub fn list_tdd_cycles(&self) -> Result<Vec<TddCycle>> {
        let dir = self.state_dir().join("tdd_cycles");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut cycles = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(cycle) = read_json_with_backup::<TddCycle>(&path) {
                cycles.push(cycle);
            }
        }
        Ok(cycles)
    }

    /// Snapshots a cycle to `backups/tdd_cycles/<id>_<unix_ts>.json`.
    pub fn backup_tdd_cycle(&self, id: &str, ts_unix_secs: i64) -> Result<()> {
        let cycle = self.load_tdd_cycle(id)?;
        std::fs::create_dir_all(self.tdd_backups_dir())?;
        let path = self
            .tdd_backups_dir()
            .join(format!("{id}_{ts_unix_secs}.json"));
        atomic_write_json(&path, &cycle)
    }

    /// Removes backup snapshots older than `days`.
    pub fn cleanup_old_tdd_backups(&self, days: i64) -> Result<usize> {
        let dir = self.tdd_backups_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut removed = 0;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let modified = entry.metadata()?.modified()?;
            let modified: chrono::DateTime<Utc> = modified.into();
            if modified < cutoff {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn check_storage_health(&self) -> StorageHealthReport {
        let dir = self.state_dir();
        let directory_exists = dir.exists();
        let writable = directory_exists && is_writable(&dir);

        let mut json_valid = HashMap::new();
        for (name, path) in [
            ("backlog.json", self.backlog_path()),
            ("status.json", self.status_path()),
        ] {
            let valid = path
                .exists()
                .then(|| std::fs::read(&path).ok())
                .flatten()
                .map(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).is_ok())
                .unwrap_or(!path.exists());
            json_valid.insert(name.to_string(), valid);
        }

        let disk_usage_bytes = directory_size(&dir).unwrap_or(0);
        let backups_count = std::fs::read_dir(self.tdd_backups_dir())
            .map(|entries| entries.count() as u64)
            .unwrap_or(0);

        StorageHealthReport {
            directory_exists,
            writable,
            json_valid,
            disk_usage_bytes,
            backups_count,
            last_checked: Utc::now(),
        }
    }
}

fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(".write_probe");
    let ok = std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}

fn directory_size(dir: &Path) -> Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += directory_size(&entry.path())?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::{Sprint, TddCycle};
    use tempfile::tempdir;

    fn init_project() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let store = ProjectStore::new(dir.path());
        store.initialize().unwrap();
        dir
    }

    #[test]
    fn initialize_rejects_path_without_git_marker() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(store.initialize().is_err());
    }

    #[test]
    fn initialize_seeds_empty_backlog_and_templates() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        let aggregate = store.load_project_data();
        assert!(aggregate.epics.is_empty());
        assert!(dir.path().join(".orch-state/architecture.md").exists());
    }

    #[test]
    fn save_and_load_project_data_round_trips() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        let mut aggregate = store.load_project_data();
        aggregate.epics.push(orch_types::Epic::new(
            "e-1".to_string(),
            "Epic one".to_string(),
            "desc".to_string(),
            orch_types::Priority::Normal,
        ));
        store.save_project_data(&aggregate).unwrap();

        let reloaded = store.load_project_data();
        assert_eq!(reloaded.epics.len(), 1);
    }

    #[test]
    fn corrupt_backlog_falls_back_to_empty_aggregate_without_panicking() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        std::fs::write(store.backlog_path(), b"not json").unwrap();
        std::fs::remove_file(store.state_dir().join("backlog.json.backup")).ok();

        let aggregate = store.load_project_data();
        assert!(aggregate.epics.is_empty());
    }

    #[test]
    fn sprint_round_trips() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        let sprint = Sprint::new("s-1".to_string(), "Ship v1".to_string(), vec!["story-1".to_string()]);
        store.save_sprint(&sprint).unwrap();

        let loaded = store.load_sprint("s-1").unwrap();
        assert_eq!(loaded.goal, "Ship v1");
    }

    #[test]
    fn get_active_tdd_cycle_skips_completed_cycles() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());

        let done_cycle = TddCycle::new("c-done".to_string(), "story-1".to_string());
        store.save_tdd_cycle(&done_cycle).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let mut open_cycle = TddCycle::new("c-open".to_string(), "story-2".to_string());
        open_cycle.tasks.push(orch_types::TddTask::new(
            "t-1".to_string(),
            "c-open".to_string(),
            "desc".to_string(),
        ));
        store.save_tdd_cycle(&open_cycle).unwrap();

        let active = store.get_active_tdd_cycle().unwrap();
        assert_eq!(active.unwrap().id, "c-open");
    }

    #[test]
    fn list_tdd_cycles_returns_every_cycle_including_completed() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        store
            .save_tdd_cycle(&TddCycle::new("c-done".to_string(), "story-1".to_string()))
            .unwrap();
        store
            .save_tdd_cycle(&TddCycle::new("c-open".to_string(), "story-2".to_string()))
            .unwrap();

        let mut cycles = store.list_tdd_cycles().unwrap();
        cycles.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].id, "c-done");
        assert_eq!(cycles[1].id, "c-open");
    }

    #[test]
    fn backup_tdd_cycle_writes_timestamped_snapshot() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        let cycle = TddCycle::new("c-1".to_string(), "story-1".to_string());
        store.save_tdd_cycle(&cycle).unwrap();

        store.backup_tdd_cycle("c-1", 1_700_000_000).unwrap();
        assert!(store
            .tdd_backups_dir()
            .join("c-1_1700000000.json")
            .exists());
    }

    #[test]
    fn status_round_trips_and_defaults_to_none() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        assert!(store.load_status().is_none());

        let status = orch_types::ProjectStatusRecord {
            workflow_state: "SPRINT_ACTIVE".to_string(),
            active_tdd_cycle_ids: vec!["c-1".to_string()],
            run_summary: orch_types::RunSummary::default(),
            updated_at: Utc::now(),
        };
        store.save_status(&status).unwrap();

        let loaded = store.load_status().unwrap();
        assert_eq!(loaded.workflow_state, "SPRINT_ACTIVE");
    }

    #[test]
    fn check_storage_health_reports_existing_writable_directory() {
        let dir = init_project();
        let store = ProjectStore::new(dir.path());
        let report = store.check_storage_health();
        assert!(report.directory_exists);
        assert!(report.writable);
        assert_eq!(report.json_valid.get("backlog.json"), Some(&true));
    }
}
