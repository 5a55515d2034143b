//! Durable task store: a single JSON file mapping task id to task record.
//!
//! Every mutation reloads from disk first, applies the change in memory, and
//! rewrites the file atomically under the sidecar lock. Reloading before each
//! mutation lets other processes (the UI in particular) write through their
//! own store handle without either side clobbering the other.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use drover_core::state::TaskStatus;
use drover_core::types::{Task, TaskId};

use crate::lock::{write_atomic, FileLock, LockError, DEFAULT_LOCK_TIMEOUT};
use crate::sync;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {task_id}")]
    NotFound { task_id: String },
    #[error("task {task_id} is in progress and cannot be deleted")]
    Busy { task_id: String },
    #[error("task store io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("task store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode task store: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    lock_timeout: Duration,
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskStore {
    /// Open the store at `path`, reading any existing collection. A file that
    /// exists but does not parse is a hard error, never silently repaired.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            tasks: Mutex::new(HashMap::new()),
        };

        {
            let mut tasks = sync::lock(&store.tasks);
            store.reload(&mut tasks)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add(&self, task: Task) -> Result<(), StoreError> {
        let mut tasks = sync::lock(&self.tasks);
        self.reload(&mut tasks)?;
        tasks.insert(task.id.0.clone(), task);
        self.persist(&tasks)
    }

    pub fn get(&self, id: &TaskId) -> Result<Task, StoreError> {
        let mut tasks = sync::lock(&self.tasks);
        self.reload(&mut tasks)?;
        tasks.get(&id.0).cloned().ok_or_else(|| StoreError::NotFound {
            task_id: id.0.clone(),
        })
    }

    /// All tasks, in no particular order. Display callers sort themselves.
    pub fn list(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = sync::lock(&self.tasks);
        self.reload(&mut tasks)?;
        Ok(tasks.values().cloned().collect())
    }

    pub fn update(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = sync::lock(&self.tasks);
        self.reload(&mut tasks)?;
        if !tasks.contains_key(&task.id.0) {
            return Err(StoreError::NotFound {
                task_id: task.id.0.clone(),
            });
        }
        tasks.insert(task.id.0.clone(), task.clone());
        self.persist(&tasks)
    }

    /// Remove a task. Tasks actively being worked on are refused; the caller
    /// must wait for the pipeline to release them first.
    pub fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = sync::lock(&self.tasks);
        self.reload(&mut tasks)?;
        let task = tasks.get(&id.0).ok_or_else(|| StoreError::NotFound {
            task_id: id.0.clone(),
        })?;
        if task.status == TaskStatus::InProgress {
            return Err(StoreError::Busy {
                task_id: id.0.clone(),
            });
        }
        tasks.remove(&id.0);
        self.persist(&tasks)
    }

    fn reload(&self, tasks: &mut HashMap<String, Task>) -> Result<(), StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tasks.clear();
                return Ok(());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        *tasks = serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    fn persist(&self, tasks: &HashMap<String, Task>) -> Result<(), StoreError> {
        let lock_path = sidecar_lock_path(&self.path);
        let _lock = FileLock::acquire(&lock_path, self.lock_timeout)?;

        let body = serde_json::to_vec_pretty(tasks)
            .map_err(|source| StoreError::Encode { source })?;
        write_atomic(&self.path, &body).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn sidecar_lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}
