//! Extend API job client and completion waiter.
//!
//! One extraction is three exchanges: upload the document, start an edit run,
//! then poll the run until it reaches a terminal status.
//!
//! ```text
//! bytes ──submit──► FileId ──start_job──► RunId ──poll_once × N──► outputSchema
//! ```
//!
//! The client never retries. Retry policy lives entirely in [`poll`].

pub mod client;
pub mod poll;

pub use client::ExtendClient;
pub use poll::{wait_for_completion, PollPolicy};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ExtendError;

/// Upload receipt returned by `POST /files`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(String);

/// Edit run id returned by `POST /files/{id}/edit-runs`.
///
/// Only obtained from a successful [`ExtractionService::start_job`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiers for one extraction invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub file_id: FileId,
    pub run_id: RunId,
}

/// Status of an edit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    /// Anything else, including a missing status. Always terminal.
    Failed(String),
}

impl JobStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("pending") => JobStatus::Pending,
            Some("running") => JobStatus::Running,
            Some("complete") => JobStatus::Complete,
            Some(other) => JobStatus::Failed(other.to_string()),
            None => JobStatus::Failed("<missing>".to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed(raw) => raw,
        }
    }
}

/// Result of one status check.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub status: JobStatus,
    /// Present once the run is complete
    pub output_schema: Option<serde_json::Value>,
}

/// The three remote operations behind one extraction.
///
/// Each call is a single best-effort exchange; failures surface immediately.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Upload a document and return its receipt.
    async fn submit(&self, bytes: Bytes, file_name: &str) -> Result<FileId, ExtendError>;

    /// Start an edit run with the default configuration.
    async fn start_job(&self, file_id: &FileId) -> Result<RunId, ExtendError>;

    /// Read the run's status once.
    async fn poll_once(&self, run_id: &RunId) -> Result<RunSnapshot, ExtendError>;
}
