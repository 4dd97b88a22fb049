use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::file_ops::{FileAction, FileOperation, FileOpsBatch};
use crate::error::FileSystemError;
use crate::services::files::ProjectFileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpStatus {
    Ok,
    Error,
    UnknownAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    pub operation: FileOperation,
    pub status: OpStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Project snapshot produced by an `export` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSnapshot {
    pub filename: String,
    pub contents: String,
}

/// One confirmed batch, as recorded in the operations log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsLogEntry {
    pub timestamp: DateTime<Utc>,
    pub results: Vec<OpResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportedSnapshot>,
}

impl OpsLogEntry {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.status == OpStatus::Ok).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Human-in-the-loop checkpoint between a proposed batch and the file tree.
///
/// Holds at most one pending batch. Nothing reaches the file system except
/// through `confirm`.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationGate {
    pending: Option<FileOpsBatch>,
    log: Vec<OpsLogEntry>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending batch. Returns the one that was dropped.
    pub fn propose(&mut self, batch: FileOpsBatch) -> Option<FileOpsBatch> {
        let replaced = self.pending.replace(batch);
        if replaced.is_some() {
            info!("Pending file operations replaced by a newer proposal");
        }
        replaced
    }

    pub fn pending(&self) -> Option<&FileOpsBatch> {
        self.pending.as_ref()
    }

    pub fn log(&self) -> &[OpsLogEntry] {
        &self.log
    }

    /// Applies the pending batch in order and records the outcome.
    /// Returns `None` when nothing was pending.
    pub fn confirm(&mut self, fs: &mut dyn ProjectFileSystem) -> Option<&OpsLogEntry> {
        let batch = self.pending.as_ref()?;
        let entry = apply_batch(batch, fs);
        self.record(entry);
        self.log.last()
    }

    /// Stores the outcome of an applied batch and clears the pending slot.
    pub fn record(&mut self, entry: OpsLogEntry) {
        self.pending = None;
        self.log.push(entry);
    }

    /// Drops the pending batch without touching the file system.
    pub fn reject(&mut self) -> Option<FileOpsBatch> {
        let dropped = self.pending.take();
        if dropped.is_some() {
            info!("Pending file operations rejected");
        }
        dropped
    }
}

/// Routes every operation to the file system, in order. A failing
/// operation is recorded and the rest still run.
pub fn apply_batch(batch: &FileOpsBatch, fs: &mut dyn ProjectFileSystem) -> OpsLogEntry {
    let timestamp = Utc::now();

    let mut results = Vec::with_capacity(batch.len());
    let mut exports = Vec::new();
    for op in &batch.operations {
        let (status, error) = match dispatch(op, fs, timestamp, &mut exports) {
            Ok(status) => (status, None),
            Err(e) => {
                warn!("File operation {:?} on '{}' failed: {}", op.action, op.path, e);
                (OpStatus::Error, Some(e.to_string()))
            }
        };
        results.push(OpResult {
            operation: op.clone(),
            status,
            error,
        });
    }

    let entry = OpsLogEntry {
        timestamp,
        results,
        exports,
    };
    info!(
        "Applied file operations: {} ok, {} failed",
        entry.succeeded(),
        entry.failed()
    );
    entry
}

fn require<'a>(op: &'a FileOperation, field: &str, value: Option<&'a str>) -> Result<&'a str, FileSystemError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| FileSystemError::MissingField {
        action: String::from(op.action.clone()),
        field: field.to_string(),
    })
}

fn dispatch(
    op: &FileOperation,
    fs: &mut dyn ProjectFileSystem,
    timestamp: DateTime<Utc>,
    exports: &mut Vec<ExportedSnapshot>,
) -> Result<OpStatus, FileSystemError> {
    if let Some(reason) = &op.malformed {
        return Err(FileSystemError::Malformed(reason.clone()));
    }
    match &op.action {
        FileAction::Create => {
            let path = require(op, "path", Some(op.path.as_str()))?;
            let content = op.content.as_deref().unwrap_or("");
            let language = op.language.as_deref().unwrap_or("text");
            fs.create_file(path, content, language)?;
        }
        FileAction::Update => {
            let path = require(op, "path", Some(op.path.as_str()))?;
            fs.update_file(path, op.content.as_deref().unwrap_or(""))?;
        }
        FileAction::Delete => {
            let path = require(op, "path", Some(op.path.as_str()))?;
            fs.delete_file(path, op.recursive.unwrap_or(false))?;
        }
        FileAction::Rename => {
            let path = require(op, "path", Some(op.path.as_str()))?;
            let new_name = require(op, "newName", op.new_name.as_deref())?;
            fs.rename_file(path, new_name)?;
        }
        FileAction::Export => {
            // Export never fails once dispatched; a broken snapshot is only logged.
            match fs.export_project() {
                Ok(contents) => exports.push(ExportedSnapshot {
                    filename: op
                        .filename
                        .clone()
                        .unwrap_or_else(|| format!("project-export-{}.json", timestamp.timestamp_millis())),
                    contents,
                }),
                Err(e) => warn!("Project export produced no snapshot: {}", e),
            }
        }
        FileAction::Unknown(action) => {
            warn!("Unknown file action '{}'", action);
            return Ok(OpStatus::UnknownAction);
        }
    }
    Ok(OpStatus::Ok)
}
