//! Audit events
//!
//! The governance core only describes what happened; writing the record is the
//! job of an [`AuditSink`]. [`JsonlAuditSink`] appends one JSON object per line.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use ulid::Ulid;

use crate::core::collaborator::{AuditSink, CollaboratorError};

const COLLABORATOR: &str = "audit log";

/// Result recorded for an audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// A single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    /// Dotted action name, e.g. `name.validate` or `change.approve`
    pub action: String,
    /// What the action was applied to (a resource name or request ID)
    pub subject: String,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        subject: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action: action.into(),
            subject: subject.into(),
            outcome,
            details: serde_json::Value::Null,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Appends events to a JSON-lines file
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every event in the log
    pub fn read_all(&self) -> Result<Vec<AuditEvent>, CollaboratorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| CollaboratorError::failed(COLLABORATOR, e))
            })
            .collect()
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), CollaboratorError> {
        let line =
            serde_json::to_string(event).map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e))?;
        writeln!(file, "{}", line).map_err(|e| CollaboratorError::failed(COLLABORATOR, e))
    }
}

/// Sink that drops every event (audit disabled)
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
