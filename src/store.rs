use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::events::{Listener, ListenerId, StatePayload, StoreEvent};
use crate::models::{Priority, Statistics, Task, TaskId, TaskRecord};
use crate::storage::{read_tasks_file, write_tasks_file, Storage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task text must not be empty")]
    EmptyText,
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Ordered task list mirrored to the task file.
///
/// Every mutation either applies in memory *and* reaches disk, or is rolled
/// back and reported. Listeners run after the file has been written, once per
/// mutation, in registration order.
pub struct TaskStore {
    storage: Storage,
    tasks: Vec<Task>,
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("storage", &self.storage)
            .field("tasks", &self.tasks)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TaskStore {
    /// Creates an empty store. Nothing is read until [`TaskStore::load`].
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            tasks: Vec::new(),
            next_id: 1,
            listeners: Vec::new(),
            next_listener_id: 1,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.iter().map(|task| &task.record)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&StatePayload<'_>) + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Appends a task. Identical text is allowed; every call yields a new id.
    pub fn add(&mut self, record: TaskRecord) -> Result<TaskId, StoreError> {
        if record.text().trim().is_empty() {
            return Err(StoreError::EmptyText);
        }
        let previous = self.tasks.clone();
        let id = self.issue_id();
        self.tasks.push(Task { id, record });
        self.commit(previous, StoreEvent::Added(id))?;
        info!("task added id={id} total={}", self.tasks.len());
        Ok(id)
    }

    /// Removes the task with this id. An unknown id is a no-op and returns
    /// `Ok(false)` without touching the file or the listeners.
    pub fn remove(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let Some(index) = self.position(id) else {
            debug!("remove ignored, unknown task id={id}");
            return Ok(false);
        };
        let previous = self.tasks.clone();
        self.tasks.remove(index);
        self.commit(previous, StoreEvent::Removed(id))?;
        info!("task removed id={id} total={}", self.tasks.len());
        Ok(true)
    }

    pub fn update(
        &mut self,
        id: TaskId,
        new_text: &str,
        new_priority: Priority,
        new_category: &str,
    ) -> Result<(), StoreError> {
        if new_text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }
        let index = self.position(id).ok_or(StoreError::NotFound(id))?;
        let previous = self.tasks.clone();
        self.tasks[index]
            .record
            .apply_edit(new_text, new_priority, new_category);
        self.commit(previous, StoreEvent::Updated(id))?;
        info!("task updated id={id}");
        Ok(())
    }

    pub fn set_completed(&mut self, id: TaskId, completed: bool) -> Result<(), StoreError> {
        let index = self.position(id).ok_or(StoreError::NotFound(id))?;
        let previous = self.tasks.clone();
        let record = &mut self.tasks[index].record;
        if completed {
            record.complete();
        } else {
            record.uncomplete();
        }
        self.commit(previous, StoreEvent::CompletionChanged { id, completed })?;
        info!("task completion set id={id} completed={completed}");
        Ok(())
    }

    /// Removes every task.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let previous = std::mem::take(&mut self.tasks);
        let removed = previous.len();
        self.commit(previous, StoreEvent::Cleared)?;
        info!("tasks cleared removed={removed}");
        Ok(removed)
    }

    /// Tasks matching every given predicate, in display order. `None` matches all.
    pub fn filter(&self, priority: Option<Priority>, category: Option<&str>) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| priority.map_or(true, |p| task.record.priority() == p))
            .filter(|task| category.map_or(true, |c| task.record.category() == c))
            .collect()
    }

    pub fn tasks_by_priority(&self, priority: Priority) -> Vec<&Task> {
        self.filter(Some(priority), None)
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for task in &self.tasks {
            let category = task.record.category();
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::collect(self.records())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.persist()?;
        debug!(
            "tasks saved path={} total={}",
            self.storage.tasks_path().display(),
            self.tasks.len()
        );
        Ok(())
    }

    /// Replaces the in-memory list with the task file. A missing file loads
    /// as empty; an unreadable or malformed one leaves the store empty and
    /// returns the error. Listeners hear about it either way.
    pub fn load(&mut self) -> Result<usize, StoreError> {
        let (records, outcome) = match self.storage.load_tasks() {
            Ok(records) => {
                let count = records.len();
                (records, Ok(count))
            }
            Err(error) => {
                warn!(
                    "task file unreadable, starting empty path={} error={error}",
                    self.storage.tasks_path().display()
                );
                (Vec::new(), Err(StoreError::from(error)))
            }
        };

        self.tasks = Vec::with_capacity(records.len());
        for record in records {
            let id = self.issue_id();
            self.tasks.push(Task { id, record });
        }
        info!(
            "tasks loaded path={} total={}",
            self.storage.tasks_path().display(),
            self.tasks.len()
        );
        self.notify(StoreEvent::Loaded);
        outcome
    }

    /// Writes the task list to `path` in the task-file format. A path without
    /// an extension gets `.json`. Returns the path actually written.
    pub fn export(&self, path: &Path) -> Result<PathBuf, StoreError> {
        let path = if path.extension().is_none() {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };
        write_tasks_file(&path, self.records())?;
        info!("tasks exported path={} total={}", path.display(), self.tasks.len());
        Ok(path)
    }

    /// Appends the tasks found in `path`, each through [`TaskStore::add`].
    /// The whole file is decoded first, so a malformed file changes nothing.
    pub fn import(&mut self, path: &Path) -> Result<Vec<TaskId>, StoreError> {
        let records = read_tasks_file(path).map_err(|error| {
            warn!("import rejected path={} error={error}", path.display());
            error
        })?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(self.add(record)?);
        }
        info!("tasks imported path={} count={}", path.display(), ids.len());
        Ok(ids)
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn issue_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.save_tasks(self.records())
    }

    fn commit(&mut self, previous: Vec<Task>, event: StoreEvent) -> Result<(), StoreError> {
        if let Err(error) = self.persist() {
            warn!("persist failed, rolling back event={event:?} error={error}");
            self.tasks = previous;
            return Err(error.into());
        }
        self.notify(event);
        Ok(())
    }

    fn notify(&mut self, event: StoreEvent) {
        debug!(
            "notifying listeners event={event:?} listeners={}",
            self.listeners.len()
        );
        let payload = StatePayload {
            event,
            tasks: &self.tasks,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&payload);
        }
    }
}
