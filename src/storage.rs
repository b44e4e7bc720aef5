use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::models::TaskRecord;

pub const TASKS_FILE: &str = "tasks.json";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid data: {0}")]
    Invalid(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Where the task list and the config live on disk.
#[derive(Debug, Clone)]
pub struct Storage {
    tasks_path: PathBuf,
    config_path: PathBuf,
}

impl Storage {
    /// Keeps `tasks.json` and `config.json` side by side in `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            tasks_path: root.join(TASKS_FILE),
            config_path: root.join(CONFIG_FILE),
        }
    }

    pub fn with_paths(tasks_path: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            tasks_path: tasks_path.into(),
            config_path: config_path.into(),
        }
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Reads the task file. A missing file is an empty list.
    pub fn load_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        match read_tasks_file(&self.tasks_path) {
            Err(error) if error.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn save_tasks<'a>(
        &self,
        tasks: impl IntoIterator<Item = &'a TaskRecord>,
    ) -> Result<(), StorageError> {
        write_tasks_file(&self.tasks_path, tasks)
    }

    pub fn load_config(&self) -> Config {
        Config::load(&self.config_path)
    }

    pub fn save_config(&self, config: &Config) -> Result<(), StorageError> {
        config.save(&self.config_path)
    }
}

/// Reads a task-file document from an arbitrary path. Unlike
/// [`Storage::load_tasks`], a missing file is reported.
pub fn read_tasks_file(path: &Path) -> Result<Vec<TaskRecord>, StorageError> {
    let mut tasks: Vec<TaskRecord> = read_json(path)?;
    for (index, task) in tasks.iter_mut().enumerate() {
        if task.text().trim().is_empty() {
            return Err(StorageError::Invalid(format!(
                "task at index {index} has empty text"
            )));
        }
        task.normalize();
    }
    Ok(tasks)
}

pub fn write_tasks_file<'a>(
    path: &Path,
    tasks: impl IntoIterator<Item = &'a TaskRecord>,
) -> Result<(), StorageError> {
    let tasks: Vec<&TaskRecord> = tasks.into_iter().collect();
    write_atomic(path, &tasks)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let mut file = File::open(path)?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

/// Writes pretty JSON to `<file name>.tmp` next to `path` and renames it over
/// `path`, so readers never observe a half-written document. The temp name
/// keeps the full file name so it cannot shadow `<stem>.tmp` files that sit
/// next to user-chosen export targets.
pub(crate) fn write_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path_for(path)?;
    let json = serde_json::to_vec_pretty(data)?;
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(temp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> Result<PathBuf, StorageError> {
    let mut name = path
        .file_name()
        .ok_or_else(|| StorageError::Invalid(format!("not a file path: {}", path.display())))?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn sample() -> Vec<TaskRecord> {
        let mut done = TaskRecord::new("file taxes", Priority::High, "Finance");
        done.complete();
        vec![
            TaskRecord::new("Buy milk", Priority::High, "Errands"),
            done,
            TaskRecord::new("Buy milk", Priority::Low, ""),
        ]
    }

    #[test]
    fn new_places_both_files_in_root() {
        let storage = Storage::new("/data/todo");
        assert_eq!(storage.tasks_path(), Path::new("/data/todo/tasks.json"));
        assert_eq!(storage.config_path(), Path::new("/data/todo/config.json"));

        let storage = Storage::with_paths("/a/t.json", "/b/c.json");
        assert_eq!(storage.tasks_path(), Path::new("/a/t.json"));
        assert_eq!(storage.config_path(), Path::new("/b/c.json"));
    }

    #[test]
    fn save_and_load_tasks_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let tasks = sample();

        storage.save_tasks(&tasks).expect("save tasks");
        assert!(storage.tasks_path().is_file());
        assert!(!dir.path().join("tasks.json.tmp").exists());

        let loaded = storage.load_tasks().expect("load tasks");
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn task_file_is_a_top_level_array() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.save_tasks(&sample()).unwrap();

        let raw = fs::read_to_string(storage.tasks_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let items = value.as_array().expect("array document");
        assert_eq!(items.len(), 3);
        for key in ["text", "completed", "priority", "category", "created_at", "completed_at"] {
            assert!(items[0].get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn missing_task_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        assert!(storage.load_tasks().unwrap().is_empty());

        // Direct reads of a named file do report absence.
        let err = read_tasks_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn malformed_task_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        fs::write(storage.tasks_path(), "not json").unwrap();
        assert!(matches!(storage.load_tasks(), Err(StorageError::Json(_))));
    }

    #[test]
    fn blank_text_in_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, r#"[{"text": "ok"}, {"text": "   "}]"#).unwrap();
        match read_tasks_file(&path) {
            Err(StorageError::Invalid(message)) => assert!(message.contains("index 1")),
            other => panic!("expected invalid data, got {other:?}"),
        }
    }

    #[test]
    fn legacy_minimal_records_load_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(
            &path,
            r#"[{"text": "water plants", "completed": true}, {"text": "read"}]"#,
        )
        .unwrap();

        let tasks = read_tasks_file(&path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].completed());
        assert!(tasks[0].completed_at().is_some());
        assert_eq!(tasks[1].priority(), Priority::Medium);
        assert_eq!(tasks[1].category(), "General");
    }

    #[test]
    fn temp_file_keeps_the_full_file_name() {
        let temp = temp_path_for(Path::new("/home/me/notes.json")).unwrap();
        assert_eq!(temp, Path::new("/home/me/notes.json.tmp"));
        let temp = temp_path_for(Path::new("backup")).unwrap();
        assert_eq!(temp, Path::new("backup.tmp"));
        assert!(matches!(
            temp_path_for(Path::new("/")),
            Err(StorageError::Invalid(_))
        ));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        fs::create_dir_all(storage.tasks_path()).unwrap();
        assert!(matches!(
            storage.save_tasks(&sample()),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn config_goes_through_storage_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        assert_eq!(storage.load_config(), Config::default());

        let mut config = Config::default();
        config.toggle_theme();
        storage.save_config(&config).unwrap();
        assert_eq!(storage.load_config(), config);
    }
}
