use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OrchestratorError, Result};

/// Writes `value` to `path` as 2-space-indented JSON using temp-file +
/// fsync + rename, so a reader never observes a partially written file and a
/// crash mid-write leaves the previous contents intact. Before the final
/// rename, the prior contents of `path` (if any) are copied to a `.backup`
/// sibling, so a write that succeeds but encodes bad data still leaves a
/// recoverable shadow one generation back.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if path.exists() {
        let backup_path = backup_path_for(path);
        fs::copy(path, &backup_path)?;
    }

    let parent = path.parent().ok_or_else(|| {
        OrchestratorError::InvalidConfig(format!("path {:?} has no parent directory", path))
    })?;
    fs::create_dir_all(parent)?;

    let tmp_path = tmp_path_for(path);
    {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Reads and deserializes `path`. If the primary file is missing, unreadable,
/// or fails JSON validation, falls back to the `.backup` shadow written by
/// the previous `atomic_write_json` call before returning an error.
pub fn read_json_with_backup<T: DeserializeOwned>(path: &Path) -> Result<T> {
    match read_json(path) {
        Ok(value) => Ok(value),
        Err(primary_err) => {
            let backup_path = backup_path_for(path);
            read_json(&backup_path).map_err(|_| primary_err)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(value)
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.tmp", file_name))
}

fn backup_path_for(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.backup", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Widget {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trips_through_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("widget.json");
        let widget = Widget {
            name: "gear".to_string(),
            count: 7,
        };

        atomic_write_json(&path, &widget).unwrap();
        let loaded: Widget = read_json_with_backup(&path).unwrap();
        assert_eq!(loaded, widget);
    }

    #[test]
    fn second_write_leaves_a_backup_of_the_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("widget.json");
        atomic_write_json(&path, &Widget { name: "a".into(), count: 1 }).unwrap();
        atomic_write_json(&path, &Widget { name: "b".into(), count: 2 }).unwrap();

        let backup_path = backup_path_for(&path);
        let backup: Widget = read_json(&backup_path).unwrap();
        assert_eq!(backup.name, "a");
    }

    #[test]
    fn corrupt_primary_falls_back_to_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("widget.json");
        atomic_write_json(&path, &Widget { name: "good".into(), count: 1 }).unwrap();

        let backup_path = backup_path_for(&path);
        fs::copy(&path, &backup_path).unwrap();
        fs::write(&path, b"not json").unwrap();

        let loaded: Widget = read_json_with_backup(&path).unwrap();
        assert_eq!(loaded.name, "good");
    }

    #[test]
    fn missing_file_and_missing_backup_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let result: Result<Widget> = read_json_with_backup(&path);
        assert!(result.is_err());
    }

    #[test]
    fn no_tmp_file_left_behind_after_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("widget.json");
        atomic_write_json(&path, &Widget { name: "a".into(), count: 1 }).unwrap();
        assert!(!tmp_path_for(&path).exists());
    }
}
