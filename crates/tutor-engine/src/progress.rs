//! Hand-off of evaluated modules to a progress store.
//!
//! The engine keeps no durable state of its own. After each evaluation the
//! orchestrator passes a [`ProgressRecord`] to an optional [`ProgressSink`];
//! [`JsonlProgressLog`] is the file-backed implementation used by the CLI.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::quiz::PerformanceLevel;

/// One evaluated module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Subject of the session.
    pub subject: String,
    /// Number of the evaluated module.
    pub module_number: u32,
    /// Title of the evaluated module.
    pub module_title: String,
    /// Quiz score.
    pub score: u8,
    /// Classification of the score.
    pub performance_level: PerformanceLevel,
    /// When the evaluation happened.
    pub recorded_at: DateTime<Utc>,
}

/// Receives progress records after each evaluation.
pub trait ProgressSink: Send + Sync {
    /// Stores one record.
    fn record(&self, record: &ProgressRecord) -> Result<()>;
}

/// Appends progress records to a JSON Lines file.
#[derive(Debug)]
pub struct JsonlProgressLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlProgressLog {
    /// Opens (or prepares to create) the log at `path`.
    ///
    /// Parent directories are created eagerly so a bad path is reported at
    /// startup rather than after the first quiz.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TutorError::progress_log(&path, format!("cannot create directory: {e}"))
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in the log, oldest first.
    ///
    /// A missing file yields an empty list.
    pub fn read_all(&self) -> Result<Vec<ProgressRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TutorError::progress_log(&self.path, e.to_string())),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| TutorError::progress_log(&self.path, format!("corrupt entry: {e}")))
            })
            .collect()
    }
}

impl ProgressSink for JsonlProgressLog {
    fn record(&self, record: &ProgressRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| TutorError::progress_log(&self.path, "log lock poisoned"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TutorError::progress_log(&self.path, e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| TutorError::progress_log(&self.path, e.to_string()))?;
        Ok(())
    }
}
