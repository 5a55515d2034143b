//! Append-only JSONL journal of task lifecycle events.
//!
//! One global file plus one file per task, under `<data-dir>/journal/`.
//! The journal is diagnostic history for operators and the UI; pipelines
//! write to it best-effort and never fail a task over a journal error.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use drover_core::state::TaskStatus;
use drover_core::types::TaskId;
use serde::{Deserialize, Serialize};

pub const JOURNAL_DIR: &str = "journal";

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("failed to create journal directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize journal event: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to append to journal file {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalKind {
    StatusChanged { from: TaskStatus, to: TaskStatus },
    AgentFailed { message: String },
    ReviewRequested { question: String },
    WorktreeDiscarded { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEvent {
    pub task_id: TaskId,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: JournalKind,
}

impl JournalEvent {
    pub fn now(task_id: &TaskId, kind: JournalKind) -> Self {
        Self {
            task_id: task_id.clone(),
            at: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonlJournal {
    root: PathBuf,
    global_file: PathBuf,
    task_dir: PathBuf,
}

impl JsonlJournal {
    pub fn new(data_dir: &Path) -> Self {
        let root = data_dir.join(JOURNAL_DIR);
        let global_file = root.join("global.jsonl");
        let task_dir = root.join("tasks");
        Self {
            root,
            global_file,
            task_dir,
        }
    }

    pub fn ensure_layout(&self) -> Result<(), JournalError> {
        for dir in [&self.root, &self.task_dir] {
            fs::create_dir_all(dir).map_err(|source| JournalError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Record an event in the global stream and the task's own stream.
    pub fn record(&self, event: &JournalEvent) -> Result<(), JournalError> {
        self.ensure_layout()?;
        append_json_line(&self.global_file, event)?;
        append_json_line(&self.task_log_path(&event.task_id), event)
    }

    pub fn task_log_path(&self, task_id: &TaskId) -> PathBuf {
        self.task_dir.join(format!("{}.jsonl", task_id.0))
    }

    pub fn global_log_path(&self) -> &Path {
        &self.global_file
    }
}

fn append_json_line(path: &Path, event: &JournalEvent) -> Result<(), JournalError> {
    let mut line =
        serde_json::to_string(event).map_err(|source| JournalError::Serialize { source })?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| JournalError::Append {
            path: path.to_path_buf(),
            source,
        })?;
    file.write_all(line.as_bytes())
        .map_err(|source| JournalError::Append {
            path: path.to_path_buf(),
            source,
        })
}
