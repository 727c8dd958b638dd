//! In-memory fakes for the network seams, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::{ExtendError, TransferError};
use crate::extend::{ExtractionService, FileId, JobStatus, RunId, RunSnapshot};
use crate::transfer::DocumentFetcher;

/// Serves canned bytes per URL; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    documents: HashMap<String, Bytes>,
    failures: HashMap<String, u16>,
    calls: Mutex<Vec<String>>,
    cancel_on_fetch: Option<CancellationToken>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, body: &[u8]) -> Self {
        self.documents
            .insert(url.to_string(), Bytes::copy_from_slice(body));
        self
    }

    pub fn fail(mut self, url: &str, status: u16) -> Self {
        self.failures.insert(url.to_string(), status);
        self
    }

    /// Fire `cancel` as soon as the first request arrives.
    pub fn cancelling(mut self, cancel: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(cancel);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, TransferError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(cancel) = &self.cancel_on_fetch {
            cancel.cancel();
        }

        if let Some(bytes) = self.documents.get(url) {
            return Ok(bytes.clone());
        }
        Err(TransferError::Status {
            url: url.to_string(),
            status: self.failures.get(url).copied().unwrap_or(404),
            body: "not found".to_string(),
        })
    }
}

/// Scripted Extend API. Every upload gets a fresh file id and run id.
pub struct FakeExtend {
    upload_status: Option<u16>,
    start_status: Option<u16>,
    statuses: Mutex<VecDeque<&'static str>>,
    payload: serde_json::Value,
    pub uploads: AtomicUsize,
    pub starts: AtomicUsize,
    pub polls: AtomicUsize,
}

impl FakeExtend {
    /// Completes on the first status check with `payload`.
    pub fn completing(payload: serde_json::Value) -> Self {
        Self {
            upload_status: None,
            start_status: None,
            statuses: Mutex::new(VecDeque::new()),
            payload,
            uploads: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    /// Statuses returned before the run completes. A non-"pending"/"running"
    /// entry is returned as-is and ends the run.
    pub fn with_statuses(self, statuses: &[&'static str]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    pub fn failing_upload(mut self, status: u16) -> Self {
        self.upload_status = Some(status);
        self
    }

    pub fn failing_start(mut self, status: u16) -> Self {
        self.start_status = Some(status);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for FakeExtend {
    async fn submit(&self, _bytes: Bytes, _file_name: &str) -> Result<FileId, ExtendError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(status) = self.upload_status {
            return Err(ExtendError::Upload {
                status,
                body: "upload rejected".to_string(),
            });
        }
        Ok(FileId::new(format!("file_{}", n)))
    }

    async fn start_job(&self, file_id: &FileId) -> Result<RunId, ExtendError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.start_status {
            return Err(ExtendError::JobStart {
                status,
                body: "bad config".to_string(),
            });
        }
        Ok(RunId::new(format!("run_for_{}", file_id)))
    }

    async fn poll_once(&self, _run_id: &RunId) -> Result<RunSnapshot, ExtendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(match next {
            Some(status) => RunSnapshot {
                status: JobStatus::parse(Some(status)),
                output_schema: None,
            },
            None => RunSnapshot {
                status: JobStatus::Complete,
                output_schema: Some(self.payload.clone()),
            },
        })
    }
}
