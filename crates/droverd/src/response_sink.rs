//! Streamed response files: one append-only file per agent invocation with a
//! header/footer frame, fsynced per chunk so the UI can tail mid-stream.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use drover_core::types::TaskId;

use crate::sync;

pub const RESPONSES_DIR: &str = "responses";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("response sink for task {task_id} is closed")]
    Closed { task_id: String },
    #[error("response sink io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writer for one agent invocation's streamed output.
///
/// Owned by exactly one pipeline from open to close. The relative path is
/// recorded on the task as soon as the sink opens so readers can follow along
/// while the agent is still streaming.
pub struct ResponseWriter {
    task_id: String,
    path: PathBuf,
    relative_path: String,
    file: Mutex<Option<File>>,
}

impl ResponseWriter {
    pub fn open(data_dir: &Path, task_id: &TaskId) -> Result<Self, SinkError> {
        let dir = data_dir.join(RESPONSES_DIR);
        fs::create_dir_all(&dir).map_err(|source| SinkError::Io {
            path: dir.clone(),
            source,
        })?;

        let started = Utc::now();
        let stamp = started.format("%Y%m%d-%H%M%S");
        let (path, filename) = unique_response_path(&dir, &task_id.0, &stamp.to_string());

        let mut file = File::create(&path).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;

        let header = format!(
            "# Agent response for task: {}\n\nStarted: {}\n\n---\n\n",
            task_id.0,
            started.to_rfc3339()
        );
        file.write_all(header.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            task_id: task_id.0.clone(),
            relative_path: format!("{RESPONSES_DIR}/{filename}"),
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Path relative to the project data directory, as stored on the task.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_chunk(&self, chunk: &[u8]) -> Result<(), SinkError> {
        let mut slot = sync::lock(&self.file);
        let file = slot.as_mut().ok_or_else(|| SinkError::Closed {
            task_id: self.task_id.clone(),
        })?;

        file.write_all(chunk)
            .and_then(|_| file.sync_all())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Append the completion footer and release the file. Closing an already
    /// closed sink is a no-op.
    pub fn close(&self) -> Result<(), SinkError> {
        let mut slot = sync::lock(&self.file);
        let Some(mut file) = slot.take() else {
            return Ok(());
        };

        let footer = format!("\n\n---\n\nCompleted: {}\n", Utc::now().to_rfc3339());
        file.write_all(footer.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

impl Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read a previously streamed response back, given the relative path stored
/// on the task.
pub fn read_response(data_dir: &Path, relative_path: &str) -> Result<String, SinkError> {
    let path = data_dir.join(relative_path);
    fs::read_to_string(&path).map_err(|source| SinkError::Io { path, source })
}

fn unique_response_path(dir: &Path, task_id: &str, stamp: &str) -> (PathBuf, String) {
    let filename = format!("{task_id}-{stamp}.md");
    let path = dir.join(&filename);
    if !path.exists() {
        return (path, filename);
    }

    // Two invocations for the same task inside one second; suffix until free.
    let mut n = 1;
    loop {
        let filename = format!("{task_id}-{stamp}-{n}.md");
        let path = dir.join(&filename);
        if !path.exists() {
            return (path, filename);
        }
        n += 1;
    }
}
