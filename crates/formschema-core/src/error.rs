//! Error types for the form retrieval and schema extraction pipeline.
//!
//! Each layer has its own enum so callers can tell local configuration
//! problems apart from remote service failures.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Problems detected before any network activity starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key required: pass --api-key or set the {env_var} environment variable")]
    MissingApiKey { env_var: &'static str },
    #[error("invalid source filter '{0}' (expected one of: uscis, eoir, other)")]
    InvalidSource(String),
    #[error("unknown form: {0}")]
    UnknownForm(String),
    #[error("no download URL pattern for form {form} (source: {source_name})")]
    NoUrlPattern { form: String, source_name: String },
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),
    #[error("failed to read settings file {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    InvalidSettingsFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Failure to fetch a document from its public source.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("GET {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl TransferError {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::Status { status, .. } => Some(*status),
            TransferError::Transport { .. } => None,
        }
    }
}

/// Failure talking to the Extend API or waiting on an edit run.
#[derive(Debug, Error)]
pub enum ExtendError {
    #[error("upload failed ({status}): {body}")]
    Upload { status: u16, body: String },
    #[error("edit run failed to start ({status}): {body}")]
    JobStart { status: u16, body: String },
    #[error("status check failed ({status}): {body}")]
    Poll { status: u16, body: String },
    #[error("request to Extend API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from Extend API: {0}")]
    InvalidResponse(String),
    #[error("edit run failed with status: {status}")]
    JobFailed { status: String },
    #[error("timed out waiting for schema extraction after {attempts} status checks")]
    Timeout { attempts: u32 },
    #[error("edit run {run_id} completed without an output schema")]
    MissingOutput { run_id: String },
    #[error("cancelled")]
    Cancelled,
}

impl ExtendError {
    /// True when the remote service itself reported the run as failed.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, ExtendError::JobFailed { .. })
    }

    /// True when the poll budget ran out before a terminal status.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExtendError::Timeout { .. })
    }
}

/// Pipeline stage a single-document run failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Transfer,
    Upload,
    JobStart,
    Extraction,
    Persist,
    Cancelled,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Resolve => write!(f, "resolve"),
            Stage::Transfer => write!(f, "transfer"),
            Stage::Upload => write!(f, "upload"),
            Stage::JobStart => write!(f, "job start"),
            Stage::Extraction => write!(f, "extraction"),
            Stage::Persist => write!(f, "persist"),
            Stage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error from the single-document pipeline, tagged with the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed: {0}")]
    Transfer(#[source] TransferError),
    #[error("{0}")]
    Upload(#[source] ExtendError),
    #[error("{0}")]
    JobStart(#[source] ExtendError),
    #[error("{0}")]
    Extraction(#[source] ExtendError),
    #[error("failed to save schema to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stage the pipeline was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) | PipelineError::Read { .. } => Stage::Resolve,
            PipelineError::Transfer(_) => Stage::Transfer,
            PipelineError::Upload(_) => Stage::Upload,
            PipelineError::JobStart(_) => Stage::JobStart,
            PipelineError::Extraction(_) => Stage::Extraction,
            PipelineError::Persist { .. } => Stage::Persist,
            PipelineError::Cancelled => Stage::Cancelled,
        }
    }

    /// True for failures reported by (or while talking to) the Extend API,
    /// as opposed to local I/O or configuration problems.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            PipelineError::Upload(_) | PipelineError::JobStart(_) | PipelineError::Extraction(_)
        )
    }

    /// Wrap an Extend error for the given stage, keeping cancellation distinct.
    pub(crate) fn extend(stage: Stage, err: ExtendError) -> Self {
        match (stage, err) {
            (_, ExtendError::Cancelled) => PipelineError::Cancelled,
            (Stage::Upload, e) => PipelineError::Upload(e),
            (Stage::JobStart, e) => PipelineError::JobStart(e),
            (_, e) => PipelineError::Extraction(e),
        }
    }
}
